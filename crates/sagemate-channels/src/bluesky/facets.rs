//! Rich-text facets for outgoing text.

use regex::Regex;
use sagemate_core::post::Facet;
use std::sync::LazyLock;

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("link pattern compiles"));

/// Trailing characters that end a sentence rather than a URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '"', '\''];

/// Link facets for every URL in `text`.
///
/// Offsets are UTF-8 byte offsets, as the network expects.
pub fn detect_links(text: &str) -> Vec<Facet> {
    LINK_RE
        .find_iter(text)
        .filter_map(|m| {
            let uri = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
            let scheme_only = uri.ends_with("://");
            (!scheme_only).then(|| Facet::link(m.start(), m.start() + uri.len(), uri))
        })
        .collect()
}
