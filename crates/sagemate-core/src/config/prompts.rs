use std::collections::HashMap;
use tracing::{info, warn};

use super::shellexpand;

/// Operator instruction sent as the system directive of every completion.
///
/// Loaded once at startup from `{data_dir}/prompts/SYSTEM_PROMPT.md`. Missing
/// files or sections fall back to the defaults.
#[derive(Debug, Clone)]
pub struct Prompts {
    /// Who the bot is.
    pub identity: String,
    /// Tone and personality.
    pub voice: String,
    /// Behavioral rules (always injected).
    pub rules: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            identity: "You are Sagemate, a thoughtful and well-read account on Bluesky.\n\
                       People mention you to get a considered take on a post, a link, or a question."
                .into(),
            voice: "- Answer in the language of the question.\n\
                    - Be direct, friendly, and concrete. No filler, no greetings, no sign-offs.\n\
                    - Have an opinion when asked for one, and say what it rests on.\n\
                    - No hashtags. No emoji unless the conversation uses them."
                .into(),
            rules: "- Read the conversation and any linked content before answering.\n\
                    - When linked content is present, ground your answer in it and say so briefly.\n\
                    - If you do not know, say so plainly instead of guessing.\n\
                    - Never pretend to have opened a link whose content you were not given.\n\
                    - Output only the reply text itself."
                .into(),
        }
    }
}

/// Bundled system prompt, embedded at compile time.
const BUNDLED_SYSTEM_PROMPT: &str = include_str!("../../../../prompts/SYSTEM_PROMPT.md");

/// Deploy the bundled prompt file to `{data_dir}/prompts/`, creating the directory if needed.
///
/// Never overwrites an existing file so operator edits are preserved.
pub fn install_bundled_prompts(data_dir: &str) {
    let expanded = shellexpand(data_dir);
    let dir = std::path::Path::new(&expanded).join("prompts");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!("prompts: failed to create {}: {e}", dir.display());
        return;
    }

    let dest = dir.join("SYSTEM_PROMPT.md");
    if !dest.exists() {
        if let Err(e) = std::fs::write(&dest, BUNDLED_SYSTEM_PROMPT) {
            warn!("prompts: failed to write {}: {e}", dest.display());
        } else {
            info!("prompts: deployed bundled SYSTEM_PROMPT.md");
        }
    }
}

impl Prompts {
    /// Load prompts from `{data_dir}/prompts/SYSTEM_PROMPT.md`.
    pub fn load(data_dir: &str) -> Self {
        let mut prompts = Self::default();
        let dir = shellexpand(data_dir);

        let prompt_path = format!("{dir}/prompts/SYSTEM_PROMPT.md");
        if let Ok(content) = std::fs::read_to_string(&prompt_path) {
            let sections = parse_markdown_sections(&content);
            if let Some(v) = sections.get("Identity") {
                prompts.identity = v.clone();
            }
            if let Some(v) = sections.get("Voice") {
                prompts.voice = v.clone();
            }
            if let Some(v) = sections.get("Rules") {
                prompts.rules = v.clone();
            }
            info!("loaded prompts from {prompt_path}");
        }

        prompts
    }

    /// The full system directive.
    pub fn system_directive(&self) -> String {
        [&self.identity, &self.voice, &self.rules]
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Parse a markdown file with `## Section` headers into a map of section name -> body.
///
/// Lines starting with `#` that are not `##` headers are treated as comments.
fn parse_markdown_sections(content: &str) -> HashMap<String, String> {
    let mut sections = HashMap::new();
    let mut current_key: Option<String> = None;
    let mut current_body = String::new();

    for line in content.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            if let Some(key) = current_key.take() {
                let trimmed = current_body.trim().to_string();
                if !trimmed.is_empty() {
                    sections.insert(key, trimmed);
                }
            }
            current_key = Some(header.trim().to_string());
            current_body.clear();
        } else if line.starts_with('#') {
            continue;
        } else if current_key.is_some() {
            current_body.push_str(line);
            current_body.push('\n');
        }
    }

    if let Some(key) = current_key {
        let trimmed = current_body.trim().to_string();
        if !trimmed.is_empty() {
            sections.insert(key, trimmed);
        }
    }

    sections
}
