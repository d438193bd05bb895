mod channels;
mod defaults;
mod prompts;
mod providers;


pub use channels::*;
pub use prompts::*;
pub use providers::*;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::SagemateError;
use defaults::*;

/// Top-level Sagemate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sagemate: SagemateConfig,
    #[serde(default)]
    pub bluesky: BlueskyConfig,
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// General agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagemateConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Also write logs to a daily file under `{data_dir}/logs/`.
    #[serde(default)]
    pub log_file: bool,
}

impl Default for SagemateConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            log_file: false,
        }
    }
}

/// Dispatch loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Sleep between poll cycles in continuous mode.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Wait after a failed cycle before polling again.
    #[serde(default = "default_error_cooldown")]
    pub error_cooldown_secs: u64,
    /// Hard ceiling for public replies, in characters.
    #[serde(default = "default_post_char_limit")]
    pub post_char_limit: usize,
    /// Hard ceiling for direct-message replies, in characters.
    #[serde(default = "default_dm_char_limit")]
    pub dm_char_limit: usize,
    /// At most this many URLs are fetched per answered item.
    #[serde(default = "default_max_urls_per_item")]
    pub max_urls_per_item: usize,
    /// At most this many ancestors are included as thread context.
    #[serde(default = "default_thread_depth")]
    pub thread_depth: usize,
    /// Run the whole pipeline but never send or mark anything read.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            error_cooldown_secs: default_error_cooldown(),
            post_char_limit: default_post_char_limit(),
            dm_char_limit: default_dm_char_limit(),
            max_urls_per_item: default_max_urls_per_item(),
            thread_depth: default_thread_depth(),
            dry_run: false,
        }
    }
}

/// Web page fetching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    /// Names of the credentials that are still empty.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.bluesky.handle.is_empty() {
            missing.push("BLUESKY_HANDLE");
        }
        if self.bluesky.password.is_empty() {
            missing.push("BLUESKY_PASSWORD");
        }
        if self.anthropic.api_key.is_empty() {
            missing.push("ANTHROPIC_API_KEY");
        }
        missing
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Override credentials and paths from the environment.
///
/// `lookup` returns the value of a variable; empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("BLUESKY_HANDLE") {
        config.bluesky.handle = v.trim().trim_start_matches('@').to_string();
    }
    if let Some(v) = get("BLUESKY_PASSWORD") {
        config.bluesky.password = v;
    }
    if let Some(v) = get("ANTHROPIC_API_KEY") {
        config.anthropic.api_key = v;
    }
    if let Some(v) = get("SAGEMATE_DATA_DIR") {
        config.sagemate.data_dir = v;
    }
}

/// Load configuration from a TOML file, then apply environment overrides.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, SagemateError> {
    let mut config = read_file(Path::new(path))?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn read_file(path: &Path) -> Result<Config, SagemateError> {
    if !path.exists() {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| SagemateError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| SagemateError::Config(format!("failed to parse config: {}", e)))?;

    Ok(config)
}
