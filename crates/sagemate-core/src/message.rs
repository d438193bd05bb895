use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::post::{Author, Embed, Facet, Post};

/// An entry of the account's notification feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// URI of the record that caused the notification.
    pub uri: String,
    /// Why the notification was sent (e.g. "mention", "reply", "like").
    pub reason: String,
    pub is_read: bool,
    pub indexed_at: DateTime<Utc>,
    pub author: Author,
    /// The post behind the notification, when the record is a post.
    pub post: Option<Post>,
}

/// Public profile summary of an account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub did: String,
    pub handle: String,
    pub display_name: Option<String>,
    pub followers_count: u64,
}

/// A direct-message conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub unread_count: u32,
    #[serde(default)]
    pub members: Vec<Author>,
}

impl Conversation {
    /// Resolve a member DID to a handle, falling back to the DID itself.
    pub fn handle_of(&self, did: &str) -> String {
        self.members
            .iter()
            .find(|m| m.did == did)
            .map(|m| m.handle.clone())
            .unwrap_or_else(|| did.to_string())
    }
}

/// A single direct message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender_did: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub facets: Vec<Facet>,
    #[serde(default)]
    pub embed: Option<Embed>,
    pub sent_at: Option<DateTime<Utc>>,
}
