//! # sagemate-web
//!
//! Everything Sagemate reads from the open web: the URLs a post points at
//! and the readable text behind them.

pub mod extract;
pub mod fetch;
pub mod harvest;
pub mod html;

pub use fetch::HttpFetcher;
pub use harvest::{harvest, harvest_parts};

use sagemate_core::traits::PageFetcher;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Extracted text per URL, for the URLs that yielded any.
pub type UrlContentMap = BTreeMap<String, String>;

/// Turns URLs into readable text. Every failure is absorbed into `None`.
pub struct ContentExtractor {
    fetcher: Arc<dyn PageFetcher>,
}

impl ContentExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Download `url` and extract its text.
    pub async fn fetch(&self, url: &str) -> Option<String> {
        let body = match self.fetcher.get(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("content: {e}");
                return None;
            }
        };
        let content = extract_content(&body);
        match &content {
            Some(text) => debug!("content: {url} -> {} chars", text.chars().count()),
            None => debug!("content: {url} yielded no text"),
        }
        content
    }

    /// Fetch at most `cap` URLs, in order, one at a time.
    pub async fn fetch_all(&self, urls: &BTreeSet<String>, cap: usize) -> UrlContentMap {
        let mut contents = UrlContentMap::new();
        for url in urls.iter().take(cap) {
            if let Some(text) = self.fetch(url).await {
                contents.insert(url.clone(), text);
            }
        }
        contents
    }
}

/// Article extraction with the plain-text pass as fallback.
pub fn extract_content(body: &str) -> Option<String> {
    let doc = html::parse(body);
    extract::extract_article(&doc).or_else(|| extract::strip_to_text(&doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sagemate_core::error::SagemateError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bodies; unknown URLs fail like a 500.
    struct CannedFetcher {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl CannedFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(u, b)| (u.to_string(), b.to_string()))
                    .collect(),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for CannedFetcher {
        async fn get(&self, url: &str) -> Result<String, SagemateError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| SagemateError::Fetch(format!("{url}: status 500")))
        }
    }

    fn article(words: &str) -> String {
        let p = format!("<p>{words} is the subject of this long and detailed paragraph.</p>");
        format!("<article>{}</article>", p.repeat(4))
    }

    #[tokio::test]
    async fn test_fetch_extracts_article() {
        let fetcher = Arc::new(CannedFetcher::new(&[("https://a.example", &article("Rust"))]));
        let extractor = ContentExtractor::new(fetcher);
        let text = extractor.fetch("https://a.example").await.unwrap();
        assert!(text.starts_with("Rust is the subject"));
    }

    #[tokio::test]
    async fn test_fetch_falls_back_to_plain_text() {
        let fetcher = Arc::new(CannedFetcher::new(&[(
            "https://short.example",
            "<html><body><nav>Menu</nav><div>Just a short note.</div></body></html>",
        )]));
        let extractor = ContentExtractor::new(fetcher);
        assert_eq!(
            extractor.fetch("https://short.example").await.as_deref(),
            Some("Just a short note.")
        );
    }

    #[tokio::test]
    async fn test_fetch_error_is_none() {
        let extractor = ContentExtractor::new(Arc::new(CannedFetcher::new(&[])));
        assert!(extractor.fetch("https://down.example").await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_all_caps_and_skips_failures() {
        let fetcher = Arc::new(CannedFetcher::new(&[
            ("https://a.example", &article("A")),
            ("https://c.example", &article("C")),
            ("https://d.example", &article("D")),
        ]));
        let extractor = ContentExtractor::new(fetcher.clone());
        let urls: BTreeSet<String> = [
            "https://d.example",
            "https://c.example",
            "https://b.example",
            "https://a.example",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let contents = extractor.fetch_all(&urls, 3).await;
        assert_eq!(
            contents.keys().collect::<Vec<_>>(),
            vec!["https://a.example", "https://c.example"]
        );
        assert_eq!(
            *fetcher.requested.lock().unwrap(),
            vec!["https://a.example", "https://b.example", "https://c.example"]
        );
    }
}
