//! Readable text from HTML pages.
//!
//! Two passes over the same parsed document:
//! - [`extract_article`] keeps the substantive blocks of the main content;
//! - [`strip_to_text`] is the fallback and keeps almost everything.

use crate::html::{self, attr, elements, is_tag, tag};
use kuchiki::NodeRef;

/// Minimum length of an article extraction to count as a success.
pub const MIN_ARTICLE_CHARS: usize = 200;
/// Article extractions are cut to this many characters.
pub const MAX_ARTICLE_CHARS: usize = 4000;
/// Fallback extractions are cut to this many characters.
pub const MAX_FALLBACK_CHARS: usize = 3000;
/// Paragraphs shorter than this are treated as captions or chrome.
const MIN_PARAGRAPH_CHARS: usize = 40;

const ARTICLE_SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "iframe", "form", "nav", "footer",
    "header", "aside",
];

const FALLBACK_SKIP_TAGS: &[&str] = &["script", "style", "nav", "footer", "header", "aside"];

/// `class`/`id` word prefixes that mark boilerplate containers.
const BOILERPLATE_PREFIXES: &[&str] = &[
    "comment",
    "sidebar",
    "share",
    "sharing",
    "social",
    "related",
    "recommend",
    "cookie",
    "consent",
    "banner",
    "advert",
    "sponsor",
    "byline",
    "author",
    "breadcrumb",
    "meta",
    "menu",
    "newsletter",
    "subscribe",
    "promo",
    "popup",
    "modal",
];

/// `class`/`id` words that mark boilerplate only on an exact match.
const BOILERPLATE_WORDS: &[&str] = &["ad", "ads", "tags", "toolbar", "widget"];

/// Elements that frame the page itself and are never treated as boilerplate.
const FRAME_TAGS: &[&str] = &["html", "body", "article", "main"];

/// Block-level elements that separate lines in the fallback pass.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "figure",
    "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section",
    "table", "td", "th", "title", "tr", "ul",
];

/// Extract the main content of a page.
///
/// Returns `None` when fewer than [`MIN_ARTICLE_CHARS`] characters survive.
pub fn extract_article(doc: &NodeRef) -> Option<String> {
    let mut scopes = Vec::new();
    find_scopes(doc, "article", &mut scopes);
    if scopes.is_empty() {
        find_scopes(doc, "main", &mut scopes);
    }
    if scopes.is_empty() {
        scopes.push(doc.clone());
    }

    let mut blocks = Vec::new();
    for scope in &scopes {
        collect_blocks(scope, &mut blocks);
    }

    let text = blocks.join("\n\n");
    if text.chars().count() < MIN_ARTICLE_CHARS {
        return None;
    }
    Some(truncate_chars(&text, MAX_ARTICLE_CHARS))
}

/// Strip navigation and code, keep every remaining line of text.
pub fn strip_to_text(doc: &NodeRef) -> Option<String> {
    let mut raw = String::new();
    collect_all_text(doc, &mut raw);

    let text = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if text.is_empty() {
        return None;
    }
    Some(truncate_chars(&text, MAX_FALLBACK_CHARS))
}

/// Cut `text` to at most `max` characters, never splitting a character.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Top-most `name` elements outside skipped subtrees.
fn find_scopes(node: &NodeRef, name: &str, out: &mut Vec<NodeRef>) {
    for child in elements(node) {
        if is_skipped(&child) {
            continue;
        }
        if is_tag(&child, name) {
            out.push(child);
        } else {
            find_scopes(&child, name, out);
        }
    }
}

fn is_skipped(el: &NodeRef) -> bool {
    tag(el).is_some_and(|name| ARTICLE_SKIP_TAGS.contains(&name.as_str())) || is_boilerplate(el)
}

fn is_boilerplate(el: &NodeRef) -> bool {
    let Some(name) = tag(el) else {
        return false;
    };
    if FRAME_TAGS.contains(&name.as_str()) {
        return false;
    }
    [attr(el, "class"), attr(el, "id")]
        .iter()
        .flatten()
        .flat_map(|value| value.split(|c: char| c.is_whitespace() || c == '-' || c == '_'))
        .map(str::to_ascii_lowercase)
        .any(|word| {
            BOILERPLATE_WORDS.contains(&word.as_str())
                || BOILERPLATE_PREFIXES.iter().any(|p| word.starts_with(p))
        })
}

fn collect_blocks(node: &NodeRef, blocks: &mut Vec<String>) {
    for child in elements(node) {
        if is_skipped(&child) {
            continue;
        }
        match tag(&child).as_deref() {
            Some("h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "blockquote") => {
                push_nonempty(blocks, html::text(&child));
            }
            Some("p") => {
                let text = html::text(&child);
                if text.chars().count() >= MIN_PARAGRAPH_CHARS {
                    blocks.push(text);
                }
            }
            Some("li") => {
                let text = html::text(&child);
                if !text.is_empty() {
                    blocks.push(format!("- {text}"));
                }
            }
            Some("pre") => push_nonempty(blocks, html::raw_text(&child).trim().to_string()),
            Some("table") => push_nonempty(blocks, render_table(&child)),
            _ => collect_blocks(&child, blocks),
        }
    }
}

fn push_nonempty(blocks: &mut Vec<String>, text: String) {
    if !text.is_empty() {
        blocks.push(text);
    }
}

/// One line per row, cells joined with ` | `.
fn render_table(table: &NodeRef) -> String {
    let mut rows = Vec::new();
    collect_rows(table, &mut rows);
    rows.iter()
        .map(|row| {
            elements(row)
                .filter(|c| is_tag(c, "td") || is_tag(c, "th"))
                .map(|c| html::text(&c))
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .filter(|line| !line.replace('|', "").trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rows of this table, not descending into nested tables.
fn collect_rows(node: &NodeRef, rows: &mut Vec<NodeRef>) {
    for child in elements(node) {
        match tag(&child).as_deref() {
            Some("tr") => rows.push(child),
            Some("table") => {}
            _ => collect_rows(&child, rows),
        }
    }
}

fn collect_all_text(node: &NodeRef, out: &mut String) {
    for child in node.children() {
        if let Some(t) = child.as_text() {
            out.push_str(&t.borrow());
            continue;
        }
        let Some(name) = tag(&child) else {
            continue;
        };
        if FALLBACK_SKIP_TAGS.contains(&name.as_str()) {
            continue;
        }
        let block = BLOCK_TAGS.contains(&name.as_str());
        if block {
            out.push('\n');
        }
        collect_all_text(&child, out);
        if block {
            out.push('\n');
        }
    }
}
