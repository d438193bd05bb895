//! Conversation history leading up to the item being answered.

use chrono::{DateTime, Utc};
use sagemate_core::{
    message::{ChatMessage, Conversation},
    post::ThreadNode,
    traits::SocialClient,
};
use tracing::warn;

/// Most earlier turns ever put in front of the model.
pub const MAX_CONTEXT_ENTRIES: usize = 10;

/// One earlier turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadEntry {
    /// Handle of the author, without the leading `@`.
    pub author: String,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Earlier turns, oldest first. The item being answered is not included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadContext {
    pub entries: Vec<ThreadEntry>,
}

impl ThreadContext {
    /// Walk parent links upward from `node`, keeping at most `depth` ancestors.
    pub fn from_node(node: &ThreadNode, depth: usize) -> Self {
        let mut entries = Vec::new();
        let mut current = node.parent.as_deref();
        while let Some(parent) = current {
            if entries.len() >= depth {
                break;
            }
            entries.push(ThreadEntry {
                author: parent.post.author.handle.clone(),
                text: parent.post.text.clone(),
                timestamp: parent.post.created_at,
            });
            current = parent.parent.as_deref();
        }
        entries.reverse();
        Self { entries }
    }

    /// Direct-message history given newest first, as the chat service returns it.
    /// Only the newest [`MAX_CONTEXT_ENTRIES`] messages are kept.
    pub fn from_messages(
        history: &[ChatMessage],
        convo: &Conversation,
        bot_did: &str,
        bot_handle: &str,
    ) -> Self {
        let entries = history
            .iter()
            .take(MAX_CONTEXT_ENTRIES)
            .rev()
            .map(|m| ThreadEntry {
                author: if m.sender_did == bot_did {
                    bot_handle.to_string()
                } else {
                    convo.handle_of(&m.sender_did)
                },
                text: m.text.clone(),
                timestamp: m.sent_at,
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Fetch the thread around `post_uri` and collect its ancestors.
///
/// A failed fetch yields an empty context.
pub async fn resolve(client: &dyn SocialClient, post_uri: &str, depth: usize) -> ThreadContext {
    let parent_height = u32::try_from(depth).unwrap_or(u32::MAX);
    match client.get_thread(post_uri, parent_height).await {
        Ok(node) => ThreadContext::from_node(&node, depth),
        Err(e) => {
            warn!("thread: context for {post_uri} unavailable: {e}");
            ThreadContext::default()
        }
    }
}
