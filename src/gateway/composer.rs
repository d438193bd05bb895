//! Prompt assembly and reply length enforcement.

use super::thread::ThreadContext;
use sagemate_core::traits::{CompletionRequest, Provider};
use sagemate_web::UrlContentMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const ELLIPSIS: &str = "...";

/// Linked page text beyond this many characters is left out of the prompt.
const URL_CONTENT_PROMPT_CHARS: usize = 2000;

/// Who is being answered, and through which surface.
#[derive(Debug, Clone, Copy)]
pub enum Addressed<'a> {
    Mention { author: &'a str },
    DirectMessage { author: &'a str },
}

/// Reply text guaranteed to fit the limit it was built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeReply(String);

impl SafeReply {
    /// Clean and truncate raw model output. Empty output yields `None`.
    pub fn new(raw: &str, limit: usize) -> Option<Self> {
        let cleaned = clean_output(raw);
        if cleaned.is_empty() {
            return None;
        }
        let text = truncate_reply(&cleaned, limit);
        (!text.is_empty()).then_some(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Display for SafeReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim model output and drop one pair of quotation marks around it.
fn clean_output(raw: &str) -> String {
    let trimmed = raw.trim();
    let pairs = [('"', '"'), ('\'', '\''), ('\u{201C}', '\u{201D}'), ('\u{00AB}', '\u{00BB}')];
    for (open, close) in pairs {
        if let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Fit `text` into `limit` characters.
///
/// Text that fits is returned as is. Otherwise it is cut at `limit - 3`
/// characters, backed off to the last whitespace so no word is split, and
/// `...` is appended. A single unbroken word is cut hard.
pub fn truncate_reply(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let Some(budget) = limit.checked_sub(ELLIPSIS.len()) else {
        return text.chars().take(limit).collect();
    };

    let cut_at = text
        .char_indices()
        .nth(budget)
        .map_or(text.len(), |(idx, _)| idx);
    let head = &text[..cut_at];
    let next_is_space = text[cut_at..].starts_with(char::is_whitespace);

    let kept = if next_is_space {
        head
    } else {
        match head.rfind(char::is_whitespace) {
            Some(idx) if !head[..idx].trim().is_empty() => &head[..idx],
            _ => head,
        }
    };
    format!("{}{ELLIPSIS}", kept.trim_end())
}

/// Render the user prompt.
///
/// Sections, in order: conversation so far, the question, linked content,
/// and the instruction with the hard length ceiling.
pub fn build_prompt(
    addressed: Addressed<'_>,
    question: &str,
    thread: &ThreadContext,
    contents: &UrlContentMap,
    limit: usize,
) -> String {
    let mut prompt = String::new();

    if !thread.is_empty() {
        prompt.push_str("Conversation so far (oldest first):\n");
        for (i, entry) in thread.entries.iter().enumerate() {
            prompt.push_str(&format!("{}. @{}: {}\n", i + 1, entry.author, entry.text));
        }
        prompt.push('\n');
    }

    let (label, surface) = match addressed {
        Addressed::Mention { author } => (
            format!("Mention from @{author} that you are answering:"),
            "reply post",
        ),
        Addressed::DirectMessage { author } => (
            format!("Direct message from @{author} that you are answering:"),
            "direct message",
        ),
    };
    prompt.push_str(&label);
    prompt.push('\n');
    prompt.push_str(question.trim());
    prompt.push_str("\n\n");

    if !contents.is_empty() {
        prompt.push_str("Content of the linked pages:\n");
        for (url, text) in contents {
            let excerpt: String = text.chars().take(URL_CONTENT_PROMPT_CHARS).collect();
            prompt.push_str(&format!("[{url}]\n{excerpt}\n\n"));
        }
    }

    prompt.push_str(&format!(
        "Write your {surface} now. It must not exceed {limit} characters. \
         Answer what was asked, using the conversation and the linked content where they help. \
         Output only the text of the {surface}."
    ));
    prompt
}

/// Produces length-safe replies from the language model.
pub struct ReplyComposer {
    provider: Arc<dyn Provider>,
    system: String,
    max_tokens: u32,
}

impl ReplyComposer {
    pub fn new(provider: Arc<dyn Provider>, system: String, max_tokens: u32) -> Self {
        Self {
            provider,
            system,
            max_tokens,
        }
    }

    /// Ask the model for a reply. Model failures and empty drafts yield `None`.
    pub async fn compose(
        &self,
        addressed: Addressed<'_>,
        question: &str,
        thread: &ThreadContext,
        contents: &UrlContentMap,
        limit: usize,
    ) -> Option<SafeReply> {
        let request = CompletionRequest {
            system: self.system.clone(),
            prompt: build_prompt(addressed, question, thread, contents, limit),
            max_tokens: self.max_tokens,
        };

        let completion = match self.provider.complete(&request).await {
            Ok(c) => c,
            Err(e) => {
                warn!("composer: {} failed: {e}", self.provider.name());
                return None;
            }
        };
        debug!(
            "composer: {} chars in {}ms (tokens: {:?})",
            completion.text.chars().count(),
            completion.processing_time_ms,
            completion.tokens_used
        );

        let reply = SafeReply::new(&completion.text, limit);
        if reply.is_none() {
            warn!("composer: model returned an empty draft");
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::thread::ThreadEntry;

    #[test]
    fn test_truncate_fits_unchanged() {
        assert_eq!(truncate_reply("short reply", 280), "short reply");
        let exact = "a".repeat(280);
        assert_eq!(truncate_reply(&exact, 280), exact);
    }

    #[test]
    fn test_truncate_backs_off_to_word_boundary() {
        let text = "word ".repeat(100);
        let out = truncate_reply(text.trim_end(), 280);
        assert!(out.chars().count() <= 280);
        assert!(out.ends_with("word..."));
        assert!(!out.contains("wo..."));
    }

    #[test]
    fn test_truncate_never_exceeds_limit() {
        let samples = [
            "The quick brown fox jumps over the lazy dog. ".repeat(20),
            "é".repeat(500),
            "🦀 crab ".repeat(80),
            format!("{} tail", "x".repeat(400)),
        ];
        for text in &samples {
            for limit in [1, 3, 4, 10, 50, 280] {
                let out = truncate_reply(text, limit);
                assert!(
                    out.chars().count() <= limit,
                    "limit {limit} exceeded: {} chars",
                    out.chars().count()
                );
            }
        }
    }

    #[test]
    fn test_truncate_unbroken_word_cut_hard() {
        let out = truncate_reply(&"x".repeat(300), 280);
        assert_eq!(out.chars().count(), 280);
        assert!(out.ends_with("xxx..."));
    }

    #[test]
    fn test_truncate_cut_exactly_at_space_keeps_word() {
        // Budget of 7 characters ends right before a space.
        assert_eq!(truncate_reply("abc def ghi jkl", 10), "abc def...");
    }

    #[test]
    fn test_safe_reply_cleans_quotes() {
        let reply = SafeReply::new("  \"It depends on the load.\"  ", 280).unwrap();
        assert_eq!(reply.as_str(), "It depends on the load.");
        let reply = SafeReply::new("\u{201C}Yes.\u{201D}", 280).unwrap();
        assert_eq!(reply.as_str(), "Yes.");
        let reply = SafeReply::new("\"Quoted\" start only", 280).unwrap();
        assert_eq!(reply.as_str(), "\"Quoted\" start only");
    }

    #[test]
    fn test_safe_reply_empty_is_none() {
        assert!(SafeReply::new("   ", 280).is_none());
        assert!(SafeReply::new("\"\"", 280).is_none());
    }

    #[test]
    fn test_build_prompt_order() {
        let thread = ThreadContext {
            entries: vec![
                ThreadEntry {
                    author: "alice.bsky.social".into(),
                    text: "Rust or Go?".into(),
                    timestamp: None,
                },
                ThreadEntry {
                    author: "bob.bsky.social".into(),
                    text: "Depends.".into(),
                    timestamp: None,
                },
            ],
        };
        let mut contents = UrlContentMap::new();
        contents.insert("https://example.com".into(), "z".repeat(2500));

        let prompt = build_prompt(
            Addressed::Mention {
                author: "carol.bsky.social",
            },
            "@sage what do you think?",
            &thread,
            &contents,
            280,
        );

        let history = prompt.find("1. @alice.bsky.social: Rust or Go?").unwrap();
        let second = prompt.find("2. @bob.bsky.social: Depends.").unwrap();
        let question = prompt.find("@sage what do you think?").unwrap();
        let content = prompt.find("[https://example.com]").unwrap();
        let instruction = prompt.find("must not exceed 280 characters").unwrap();
        assert!(history < second && second < question);
        assert!(question < content && content < instruction);
        assert!(prompt.contains("Mention from @carol.bsky.social"));
        assert!(prompt.contains(&"z".repeat(2000)));
        assert!(!prompt.contains(&"z".repeat(2001)));
    }

    #[test]
    fn test_build_prompt_dm_without_context() {
        let prompt = build_prompt(
            Addressed::DirectMessage { author: "dan.test" },
            "hello?",
            &ThreadContext::default(),
            &UrlContentMap::new(),
            1000,
        );
        assert!(prompt.starts_with("Direct message from @dan.test"));
        assert!(!prompt.contains("Conversation so far"));
        assert!(!prompt.contains("linked pages"));
        assert!(prompt.contains("must not exceed 1000 characters"));
    }
}
