//! [`PageFetcher`] over reqwest.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use sagemate_core::{config::FetchConfig, error::SagemateError, traits::PageFetcher};
use std::time::Duration;
use tracing::debug;

/// Follows at most this many redirects.
const MAX_REDIRECTS: usize = 10;
/// Bodies are read up to this many bytes; the rest is dropped.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Downloads pages with a fixed timeout and identifying user agent.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, SagemateError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| SagemateError::Fetch(format!("client build failed: {e}")))?;
        Ok(Self { client })
    }
}

/// Whether a `Content-Type` value describes a page we can read as text.
/// A missing header is given the benefit of the doubt.
pub(crate) fn is_textual(content_type: Option<&str>) -> bool {
    let Some(value) = content_type else {
        return true;
    };
    let mime = value
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.is_empty()
        || mime.starts_with("text/")
        || mime == "application/xhtml+xml"
        || mime == "application/xml"
}

/// Append `chunk` to `body` without growing it past `cap` bytes.
/// Returns `false` once the cap is reached.
pub(crate) fn push_capped(body: &mut Vec<u8>, chunk: &[u8], cap: usize) -> bool {
    let room = cap.saturating_sub(body.len());
    body.extend_from_slice(&chunk[..chunk.len().min(room)]);
    body.len() < cap
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<String, SagemateError> {
        debug!("fetch: GET {url}");
        let mut resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SagemateError::Fetch(format!("{url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SagemateError::Fetch(format!("{url}: status {status}")));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if !is_textual(content_type.as_deref()) {
            return Err(SagemateError::Fetch(format!(
                "{url}: not a text page ({})",
                content_type.unwrap_or_default()
            )));
        }

        if let Some(len) = resp.content_length() {
            if len > MAX_BODY_BYTES as u64 {
                return Err(SagemateError::Fetch(format!(
                    "{url}: body too large ({len} bytes)"
                )));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| SagemateError::Fetch(format!("{url}: body read failed: {e}")))?
        {
            if !push_capped(&mut body, &chunk, MAX_BODY_BYTES) {
                debug!("fetch: {url} truncated at {MAX_BODY_BYTES} bytes");
                break;
            }
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
