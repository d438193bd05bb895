//! URL harvesting from posts.
//!
//! URLs come from three places: the plain text, link facets, and the embed
//! (external card or quoted post). Quoted posts are followed recursively.

use regex::Regex;
use sagemate_core::post::{Embed, Facet, FacetFeature, Post};
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("url pattern compiles"));

/// Quoted posts nested deeper than this are not followed.
const MAX_QUOTE_DEPTH: usize = 5;

/// Every URL referenced by `post`, deduplicated by exact string match.
pub fn harvest(post: &Post) -> BTreeSet<String> {
    let mut urls = BTreeSet::new();
    let mut visited = HashSet::from([post.uri.clone()]);
    collect(
        &post.text,
        &post.facets,
        post.embed.as_ref(),
        0,
        &mut visited,
        &mut urls,
    );
    urls
}

/// Same as [`harvest`] for content that is not a post, such as a direct message.
pub fn harvest_parts(text: &str, facets: &[Facet], embed: Option<&Embed>) -> BTreeSet<String> {
    let mut urls = BTreeSet::new();
    let mut visited = HashSet::new();
    collect(text, facets, embed, 0, &mut visited, &mut urls);
    urls
}

fn collect(
    text: &str,
    facets: &[Facet],
    embed: Option<&Embed>,
    depth: usize,
    visited: &mut HashSet<String>,
    urls: &mut BTreeSet<String>,
) {
    urls.extend(URL_RE.find_iter(text).map(|m| m.as_str().to_string()));

    for feature in facets.iter().flat_map(|f| &f.features) {
        if let FacetFeature::Link { uri } = feature {
            urls.insert(uri.clone());
        }
    }

    let Some(embed) = embed else {
        return;
    };
    if let Embed::External { uri, .. } = embed {
        if !uri.is_empty() {
            urls.insert(uri.clone());
        }
    }
    if let Some((target, Some(quoted))) = embed.quoted() {
        if depth >= MAX_QUOTE_DEPTH || !visited.insert(target.uri.clone()) {
            return;
        }
        collect(
            &quoted.text,
            &quoted.facets,
            quoted.embed.as_ref(),
            depth + 1,
            visited,
            urls,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sagemate_core::post::{Author, StrongRef};

    fn post(uri: &str, text: &str) -> Post {
        Post {
            uri: uri.into(),
            cid: format!("cid-{uri}"),
            author: Author::default(),
            text: text.into(),
            created_at: None,
            facets: vec![],
            embed: None,
            reply: None,
        }
    }

    fn quote(inner: Post) -> Embed {
        Embed::Record {
            target: inner.strong_ref(),
            post: Some(Box::new(inner)),
        }
    }

    #[test]
    fn test_harvest_plain_text_is_verbatim() {
        let p = post("at://a", "see https://example.com/article? and http://x.org/a,b.");
        let urls: Vec<_> = harvest(&p).into_iter().collect();
        assert_eq!(
            urls,
            vec!["http://x.org/a,b.", "https://example.com/article?"]
        );
    }

    #[test]
    fn test_harvest_dedups_across_sources() {
        let mut p = post("at://a", "read https://example.com/a");
        p.facets = vec![Facet::link(5, 26, "https://example.com/a")];
        p.embed = Some(Embed::External {
            uri: "https://example.com/a".into(),
            title: "A".into(),
            description: String::new(),
        });
        let urls = harvest(&p);
        assert_eq!(urls.len(), 1);
        assert!(urls.contains("https://example.com/a"));
    }

    #[test]
    fn test_harvest_case_sensitive() {
        let mut p = post("at://a", "https://Example.com/A");
        p.facets = vec![Facet::link(0, 21, "https://example.com/a")];
        assert_eq!(harvest(&p).len(), 2);
    }

    #[test]
    fn test_harvest_facet_with_truncated_display_text() {
        let mut p = post("at://a", "read example.com/long...");
        p.facets = vec![Facet::link(5, 24, "https://example.com/long/path")];
        let urls: Vec<_> = harvest(&p).into_iter().collect();
        assert_eq!(urls, vec!["https://example.com/long/path"]);
    }

    #[test]
    fn test_harvest_follows_quoted_posts() {
        let mut inner = post("at://inner", "inner https://inner.example/x");
        inner.embed = Some(Embed::External {
            uri: "https://card.example".into(),
            title: String::new(),
            description: String::new(),
        });
        let mut p = post("at://outer", "outer");
        p.embed = Some(quote(inner));
        let urls = harvest(&p);
        assert!(urls.contains("https://inner.example/x"));
        assert!(urls.contains("https://card.example"));
    }

    #[test]
    fn test_harvest_unhydrated_quote_contributes_nothing() {
        let mut p = post("at://outer", "no links");
        p.embed = Some(Embed::Record {
            target: StrongRef {
                uri: "at://q".into(),
                cid: "c".into(),
            },
            post: None,
        });
        assert!(harvest(&p).is_empty());
    }

    #[test]
    fn test_harvest_quote_depth_is_bounded() {
        let mut current = post("at://q9", "https://depth.example/9");
        for i in (0..9).rev() {
            let mut outer = post(&format!("at://q{i}"), &format!("https://depth.example/{i}"));
            outer.embed = Some(quote(current));
            current = outer;
        }
        let urls = harvest(&current);
        assert!(urls.contains("https://depth.example/0"));
        assert!(urls.contains("https://depth.example/5"));
        assert!(!urls.contains("https://depth.example/6"));
    }

    #[test]
    fn test_harvest_quote_cycle_stops() {
        let mut inner = post("at://a", "https://inner.example");
        inner.embed = Some(Embed::Record {
            target: StrongRef {
                uri: "at://a".into(),
                cid: "c".into(),
            },
            post: Some(Box::new(post("at://a", "https://loop.example"))),
        });
        let mut p = post("at://a", "https://outer.example");
        p.embed = Some(quote(inner));
        let urls = harvest(&p);
        assert!(urls.contains("https://outer.example"));
        assert!(!urls.contains("https://inner.example"), "self-quote is not followed");
    }

    #[test]
    fn test_harvest_parts_for_messages() {
        let urls = harvest_parts("look https://dm.example", &[], None);
        assert_eq!(urls.into_iter().collect::<Vec<_>>(), vec!["https://dm.example"]);
    }

    #[test]
    fn test_harvest_deterministic() {
        let p = post("at://a", "https://b.example https://a.example https://b.example");
        assert_eq!(harvest(&p), harvest(&p));
        assert_eq!(harvest(&p).len(), 2);
    }
}
