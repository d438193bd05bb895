//! Deciding which post a mention is really asking about.

use regex::Regex;
use sagemate_core::{post::Post, traits::SocialClient};
use std::sync::LazyLock;
use tracing::{info, warn};

static HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[\w.\-]+").expect("handle pattern compiles"));

/// A mention with less text than this (after removing handles) is empty.
const MIN_QUESTION_CHARS: usize = 3;

/// The post to answer and the text that counts as the question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub post: Post,
    pub question: String,
    /// The mention was empty and the target is the post it replied to.
    pub redirected: bool,
}

/// Remove every `@handle` token and collapse the remaining whitespace.
pub fn strip_mentions(text: &str) -> String {
    HANDLE_RE
        .replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether the mention carries no question of its own.
pub fn is_empty_mention(text: &str) -> bool {
    strip_mentions(text).chars().count() < MIN_QUESTION_CHARS
}

/// Resolve the target of a mention.
///
/// An empty mention that is itself a reply (someone tagging the bot under a
/// post) is redirected to that parent post. If the parent cannot be fetched
/// the mention itself stays the target.
pub async fn resolve(client: &dyn SocialClient, mention: &Post) -> ReplyTarget {
    let unchanged = || ReplyTarget {
        post: mention.clone(),
        question: mention.text.clone(),
        redirected: false,
    };

    if !is_empty_mention(&mention.text) {
        return unchanged();
    }
    let Some(reply) = &mention.reply else {
        return unchanged();
    };

    match client.get_post(&reply.parent.uri).await {
        Ok(parent) => {
            info!(
                "target: empty mention {} redirected to parent {}",
                mention.uri, parent.uri
            );
            ReplyTarget {
                question: parent.text.clone(),
                post: parent,
                redirected: true,
            }
        }
        Err(e) => {
            warn!(
                "target: parent {} of empty mention unavailable: {e}",
                reply.parent.uri
            );
            unchanged()
        }
    }
}
