use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Bluesky account config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueskyConfig {
    /// Account handle (e.g. `sagemate.bsky.social`). Env: `BLUESKY_HANDLE`.
    #[serde(default)]
    pub handle: String,
    /// App password. Env: `BLUESKY_PASSWORD`.
    #[serde(default)]
    pub password: String,
    /// PDS / entryway the session is created against.
    #[serde(default = "default_service_url")]
    pub service_url: String,
    /// Notification reasons that count as something to answer.
    #[serde(default = "default_notification_reasons")]
    pub notification_reasons: Vec<String>,
    #[serde(default = "default_notification_limit")]
    pub notification_limit: u32,
    /// Whether to answer direct messages at all.
    #[serde(default = "default_true")]
    pub dm_enabled: bool,
    /// How many recent messages of a conversation to read per unread DM.
    #[serde(default = "default_dm_history")]
    pub dm_history: u32,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            handle: String::new(),
            password: String::new(),
            service_url: default_service_url(),
            notification_reasons: default_notification_reasons(),
            notification_limit: default_notification_limit(),
            dm_enabled: true,
            dm_history: default_dm_history(),
        }
    }
}
