//! In-memory record of what this run already settled.
//!
//! The remote read flags are the primary dedup mechanism; the ledger covers
//! the window where a reply went out but marking it read did not stick.

use std::collections::{HashMap, HashSet, VecDeque};

/// Settled keys, and separately failing keys, remembered before the oldest
/// are forgotten.
pub const LEDGER_CAPACITY: usize = 512;

/// Failed attempts after which an item is given up on.
pub const MAX_ATTEMPTS: u32 = 3;

/// What a recorded failure means for the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Try again next cycle. Carries the attempts so far.
    Retry(u32),
    /// Attempts exhausted; the item is now settled.
    GiveUp(u32),
}

pub struct ReplyLedger {
    capacity: usize,
    order: VecDeque<String>,
    settled: HashSet<String>,
    failures: HashMap<String, u32>,
    /// Failing keys, oldest first.
    failure_order: VecDeque<String>,
}

impl Default for ReplyLedger {
    fn default() -> Self {
        Self::new(LEDGER_CAPACITY)
    }
}

impl ReplyLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            settled: HashSet::new(),
            failures: HashMap::new(),
            failure_order: VecDeque::new(),
        }
    }

    /// Whether `key` was answered or given up on during this run.
    pub fn is_settled(&self, key: &str) -> bool {
        self.settled.contains(key)
    }

    pub fn record_answered(&mut self, key: &str) {
        self.forget_failures(key);
        self.settle(key);
    }

    /// Count a failed attempt. A key that fails once and never comes back is
    /// eventually forgotten.
    pub fn record_failure(&mut self, key: &str) -> FailureOutcome {
        let attempts = match self.failures.get_mut(key) {
            Some(count) => {
                *count += 1;
                *count
            }
            None => {
                self.failures.insert(key.to_string(), 1);
                self.failure_order.push_back(key.to_string());
                while self.failure_order.len() > self.capacity {
                    if let Some(oldest) = self.failure_order.pop_front() {
                        self.failures.remove(&oldest);
                    }
                }
                1
            }
        };
        if attempts >= MAX_ATTEMPTS {
            self.forget_failures(key);
            self.settle(key);
            FailureOutcome::GiveUp(attempts)
        } else {
            FailureOutcome::Retry(attempts)
        }
    }

    pub fn len(&self) -> usize {
        self.settled.len()
    }

    fn forget_failures(&mut self, key: &str) {
        if self.failures.remove(key).is_some() {
            self.failure_order.retain(|k| k != key);
        }
    }

    fn settle(&mut self, key: &str) {
        if self.settled.insert(key.to_string()) {
            self.order.push_back(key.to_string());
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.settled.remove(&oldest);
            }
        }
    }
}
