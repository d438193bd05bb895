//! Gateway: the dispatch loop connecting the social account, the web and the model.
//!
//! Each cycle polls notifications and unread direct messages, answers them one
//! at a time, then marks them read in one batch. Items run in their own task
//! so a failure or panic skips only that item.

mod composer;
mod ledger;
mod pipeline;
mod target;
mod thread;


use chrono::{DateTime, Duration as ChronoDuration, Utc};
use composer::ReplyComposer;
use ledger::{FailureOutcome, ReplyLedger};
use pipeline::{Pipeline, PipelineSettings};
use sagemate_core::{
    config::{Config, Prompts},
    error::SagemateError,
    message::{ChatMessage, Conversation, Notification},
    traits::{PageFetcher, Provider, SocialClient},
};
use sagemate_web::ContentExtractor;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Pages fetched per item, whatever the config asks for.
const MAX_URLS_PER_ITEM: usize = 3;

/// State owned by the dispatch loop for the lifetime of a run.
pub struct DispatchState {
    pub iteration: u64,
    /// Cleared for the rest of the run once the chat service refuses us.
    pub dm_available: bool,
    pub ledger: ReplyLedger,
}

impl DispatchState {
    pub fn new(dm_enabled: bool) -> Self {
        Self {
            iteration: 0,
            dm_available: dm_enabled,
            ledger: ReplyLedger::default(),
        }
    }

    fn disable_dms(&mut self, err: &SagemateError) {
        if self.dm_available {
            warn!("direct messages unavailable, disabled for this run: {err}");
            self.dm_available = false;
        }
    }
}

/// Counts for one cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub mentions: usize,
    pub answered: usize,
    pub failed: usize,
    pub given_up: usize,
    pub dms_answered: usize,
}

/// Loop settings resolved from config and CLI flags.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub continuous: bool,
    pub poll_interval: Duration,
    pub error_cooldown: Duration,
    pub dry_run: bool,
    pub notification_reasons: Vec<String>,
    pub notification_limit: u32,
    pub dm_enabled: bool,
    pub dm_history: u32,
}

impl LoopSettings {
    pub fn from_config(cfg: &Config, continuous: bool) -> Self {
        Self {
            continuous,
            poll_interval: Duration::from_secs(cfg.dispatch.poll_interval_secs),
            error_cooldown: Duration::from_secs(cfg.dispatch.error_cooldown_secs),
            dry_run: cfg.dispatch.dry_run,
            notification_reasons: cfg.bluesky.notification_reasons.clone(),
            notification_limit: cfg.bluesky.notification_limit,
            dm_enabled: cfg.bluesky.dm_enabled,
            dm_history: cfg
                .bluesky
                .dm_history
                .min(thread::MAX_CONTEXT_ENTRIES as u32),
        }
    }
}

/// The dispatch loop.
pub struct Gateway {
    client: Arc<dyn SocialClient>,
    pipeline: Arc<Pipeline>,
    settings: LoopSettings,
}

impl Gateway {
    pub fn new(
        client: Arc<dyn SocialClient>,
        pipeline: Arc<Pipeline>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            client,
            pipeline,
            settings,
        }
    }

    /// Wire a gateway from config and its collaborators.
    pub fn from_config(
        cfg: &Config,
        prompts: &Prompts,
        client: Arc<dyn SocialClient>,
        provider: Arc<dyn Provider>,
        fetcher: Arc<dyn PageFetcher>,
        continuous: bool,
    ) -> Self {
        let composer = ReplyComposer::new(
            provider,
            prompts.system_directive(),
            cfg.anthropic.max_tokens,
        );
        let settings = PipelineSettings {
            post_char_limit: cfg.dispatch.post_char_limit,
            dm_char_limit: cfg.dispatch.dm_char_limit,
            max_urls_per_item: cfg.dispatch.max_urls_per_item.min(MAX_URLS_PER_ITEM),
            thread_depth: cfg.dispatch.thread_depth.min(thread::MAX_CONTEXT_ENTRIES),
            dry_run: cfg.dispatch.dry_run,
        };
        let pipeline = Pipeline::new(
            client.clone(),
            ContentExtractor::new(fetcher),
            composer,
            settings,
        );
        Self::new(
            client,
            Arc::new(pipeline),
            LoopSettings::from_config(cfg, continuous),
        )
    }

    /// Run until the operator interrupts (or after one pass when not continuous).
    pub async fn run(&self) -> anyhow::Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` resolves. Shutdown is honored during a cycle,
    /// a sleep or a cooldown.
    pub async fn run_until<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut state = DispatchState::new(self.settings.dm_enabled);

        info!(
            "Sagemate running as @{} | mode: {} | dry-run: {} | dms: {}",
            self.client.handle(),
            if self.settings.continuous {
                "continuous"
            } else {
                "single pass"
            },
            self.settings.dry_run,
            if state.dm_available { "on" } else { "off" },
        );

        if state.dm_available {
            self.check_dms(&mut state).await;
        }

        loop {
            state.iteration += 1;
            let outcome = tokio::select! {
                outcome = self.run_cycle(&mut state) => outcome,
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
            };

            let pause = match outcome {
                Ok(summary) => {
                    info!(
                        "cycle {}: {} mentions, {} answered, {} failed, {} given up, {} dms answered",
                        state.iteration,
                        summary.mentions,
                        summary.answered,
                        summary.failed,
                        summary.given_up,
                        summary.dms_answered
                    );
                    if !self.settings.continuous {
                        break;
                    }
                    self.settings.poll_interval
                }
                Err(e) => {
                    error!("cycle {} failed: {e}", state.iteration);
                    if !self.settings.continuous {
                        return Err(e.into());
                    }
                    self.settings.error_cooldown
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        info!(
            "Sagemate stopped after {} cycle(s), {} item(s) settled",
            state.iteration,
            state.ledger.len()
        );
        Ok(())
    }

    /// Startup check of the chat service.
    async fn check_dms(&self, state: &mut DispatchState) {
        match self.client.list_conversations().await {
            Ok(convos) => info!("direct messages available ({} conversations)", convos.len()),
            Err(e) if e.is_unsupported() => state.disable_dms(&e),
            Err(e) => warn!("direct message check failed, will retry each cycle: {e}"),
        }
    }

    /// One polling cycle. Only a failure to list notifications fails the cycle.
    pub async fn run_cycle(&self, state: &mut DispatchState) -> Result<CycleSummary, SagemateError> {
        let started_at = Utc::now();
        let notifications = self
            .client
            .list_notifications(self.settings.notification_limit)
            .await?;
        let any_unread = notifications.iter().any(|n| !n.is_read);
        let pending = self.select_mentions(notifications, &state.ledger);

        let mut summary = CycleSummary {
            mentions: pending.len(),
            ..Default::default()
        };
        let mut retry_floor: Option<DateTime<Utc>> = None;

        for notification in pending {
            let Some(post) = notification.post else {
                continue;
            };
            let key = notification.uri;
            let pipeline = self.pipeline.clone();
            let task = tokio::spawn(async move { pipeline.answer_mention(&post).await });

            let failure = match task.await {
                Ok(Ok(_)) => {
                    state.ledger.record_answered(&key);
                    summary.answered += 1;
                    continue;
                }
                Ok(Err(e)) => format!("{e}"),
                Err(join) => format!("task panicked: {join}"),
            };

            match state.ledger.record_failure(&key) {
                FailureOutcome::Retry(attempts) => {
                    warn!("mention {key} failed (attempt {attempts}), will retry: {failure}");
                    summary.failed += 1;
                    retry_floor = Some(match retry_floor {
                        Some(floor) => floor.min(notification.indexed_at),
                        None => notification.indexed_at,
                    });
                }
                FailureOutcome::GiveUp(attempts) => {
                    error!("mention {key} failed {attempts} times, giving up: {failure}");
                    summary.given_up += 1;
                }
            }
        }

        let mut settled_convos = Vec::new();
        if state.dm_available {
            summary.dms_answered = self.process_conversations(state, &mut settled_convos).await;
        }

        if self.settings.dry_run {
            return Ok(summary);
        }
        if any_unread {
            let seen_at = seen_cutoff(started_at, retry_floor);
            if let Err(e) = self.client.mark_notifications_seen(seen_at).await {
                warn!("failed to mark notifications seen: {e}");
            }
        }
        if state.dm_available {
            self.mark_conversations_read(state, &settled_convos).await;
        }

        Ok(summary)
    }

    /// Unread notifications worth answering, oldest first.
    fn select_mentions(
        &self,
        notifications: Vec<Notification>,
        ledger: &ReplyLedger,
    ) -> Vec<Notification> {
        let own_did = self.client.did();
        let mut pending: Vec<Notification> = notifications
            .into_iter()
            .filter(|n| {
                !n.is_read
                    && n.post.is_some()
                    && n.author.did != own_did
                    && self.settings.notification_reasons.contains(&n.reason)
                    && !ledger.is_settled(&n.uri)
            })
            .collect();
        pending.reverse();
        pending.sort_by_key(|n| n.indexed_at);
        pending
    }

    /// Answer every conversation with unread messages. Returns how many
    /// messages were answered; conversations that need no further work are
    /// pushed to `settled` for marking once the cycle ends.
    async fn process_conversations(
        &self,
        state: &mut DispatchState,
        settled: &mut Vec<String>,
    ) -> usize {
        let convos = match self.client.list_conversations().await {
            Ok(convos) => convos,
            Err(e) if e.is_unsupported() => {
                state.disable_dms(&e);
                return 0;
            }
            Err(e) => {
                warn!("failed to list conversations: {e}");
                return 0;
            }
        };

        let mut answered = 0;
        for convo in convos.into_iter().filter(|c| c.unread_count > 0) {
            match self.process_conversation(state, convo, settled).await {
                Ok(true) => answered += 1,
                Ok(false) => {}
                Err(e) if e.is_unsupported() => {
                    state.disable_dms(&e);
                    break;
                }
                Err(e) => warn!("{e}"),
            }
        }
        answered
    }

    /// Answer one conversation. `Ok(true)` when a reply was delivered.
    async fn process_conversation(
        &self,
        state: &mut DispatchState,
        convo: Conversation,
        settled: &mut Vec<String>,
    ) -> Result<bool, SagemateError> {
        let messages = self
            .client
            .get_messages(&convo.id, self.settings.dm_history)
            .await?;

        let Some((message, history)) = newest_incoming(messages, self.client.did()) else {
            settled.push(convo.id);
            return Ok(false);
        };
        let key = format!("dm:{}:{}", convo.id, message.id);
        if state.ledger.is_settled(&key) {
            settled.push(convo.id);
            return Ok(false);
        }

        let pipeline = self.pipeline.clone();
        let task_convo = convo.clone();
        let task = tokio::spawn(async move {
            pipeline
                .answer_dm(&task_convo, &message, &history)
                .await
        });

        let failure = match task.await {
            Ok(Ok(_)) => {
                state.ledger.record_answered(&key);
                settled.push(convo.id);
                return Ok(true);
            }
            Ok(Err(e)) if e.is_unsupported() => return Err(e),
            Ok(Err(e)) => format!("{e}"),
            Err(join) => format!("task panicked: {join}"),
        };

        match state.ledger.record_failure(&key) {
            FailureOutcome::Retry(attempts) => {
                warn!("dm {key} failed (attempt {attempts}), left unread: {failure}");
            }
            FailureOutcome::GiveUp(attempts) => {
                error!("dm {key} failed {attempts} times, giving up: {failure}");
                settled.push(convo.id);
            }
        }
        Ok(false)
    }

    async fn mark_conversations_read(&self, state: &mut DispatchState, convo_ids: &[String]) {
        for convo_id in convo_ids {
            match self.client.mark_conversation_read(convo_id).await {
                Ok(()) => {}
                Err(e) if e.is_unsupported() => {
                    state.disable_dms(&e);
                    return;
                }
                Err(e) => warn!("failed to mark conversation {convo_id} read: {e}"),
            }
        }
    }
}

/// The newest message of a conversation when it was not sent by the bot,
/// together with the earlier messages. `messages` is newest first.
fn newest_incoming(
    mut messages: Vec<ChatMessage>,
    own_did: &str,
) -> Option<(ChatMessage, Vec<ChatMessage>)> {
    if messages.is_empty() || messages[0].sender_did == own_did {
        return None;
    }
    let newest = messages.remove(0);
    Some((newest, messages))
}

/// The `seenAt` to report after a cycle.
///
/// Normally the cycle start. When some items failed and will be retried, the
/// cutoff moves just before the oldest of them so they stay unread.
fn seen_cutoff(
    started_at: DateTime<Utc>,
    retry_floor: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    match retry_floor {
        Some(floor) => started_at.min(floor - ChronoDuration::milliseconds(1)),
        None => started_at,
    }
}
