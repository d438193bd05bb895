//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "Sagemate".to_string()
}

pub fn default_data_dir() -> String {
    "~/.sagemate".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_service_url() -> String {
    "https://bsky.social".to_string()
}

pub fn default_notification_reasons() -> Vec<String> {
    vec!["mention".to_string()]
}

pub fn default_notification_limit() -> u32 {
    50
}

pub fn default_dm_history() -> u32 {
    10
}

pub fn default_anthropic_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

pub fn default_anthropic_max_tokens() -> u32 {
    400
}

pub fn default_poll_interval() -> u64 {
    60
}

pub fn default_error_cooldown() -> u64 {
    60
}

pub fn default_post_char_limit() -> usize {
    280
}

pub fn default_dm_char_limit() -> usize {
    1000
}

pub fn default_max_urls_per_item() -> usize {
    3
}

pub fn default_thread_depth() -> usize {
    10
}

pub fn default_fetch_timeout() -> u64 {
    10
}

pub fn default_user_agent() -> String {
    format!(
        "Sagemate/{} (+bluesky reply bot)",
        env!("CARGO_PKG_VERSION")
    )
}
