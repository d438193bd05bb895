//! DOM access for the extraction passes.
//!
//! Pages are parsed with kuchiki (html5ever underneath), which handles
//! malformed markup, character references and raw-text elements the way
//! browsers do. This module only adds the few walks the extractor needs.

use kuchiki::traits::TendrilSink;
use kuchiki::NodeRef;

/// Parse a full HTML document.
pub fn parse(html: &str) -> NodeRef {
    kuchiki::parse_html().one(html)
}

/// Lower-case tag name, `None` for text, comments and the document itself.
pub fn tag(node: &NodeRef) -> Option<String> {
    node.as_element().map(|el| el.name.local.to_string())
}

/// Whether `node` is an element named `name`.
pub fn is_tag(node: &NodeRef, name: &str) -> bool {
    node.as_element().is_some_and(|el| &*el.name.local == name)
}

pub fn attr(node: &NodeRef, name: &str) -> Option<String> {
    let el = node.as_element()?;
    let attributes = el.attributes.borrow();
    attributes.get(name).map(str::to_string)
}

/// Child elements, skipping text and comments.
pub fn elements(node: &NodeRef) -> impl Iterator<Item = NodeRef> {
    node.children().filter(|c| c.as_element().is_some())
}

/// All descendant text, whitespace collapsed to single spaces.
pub fn text(node: &NodeRef) -> String {
    raw_text(node)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// All descendant text as written, with `<br>` as a newline.
pub fn raw_text(node: &NodeRef) -> String {
    let mut out = String::new();
    raw_text_into(node, &mut out);
    out
}

fn raw_text_into(node: &NodeRef, out: &mut String) {
    for child in node.children() {
        if let Some(t) = child.as_text() {
            out.push_str(&t.borrow());
        } else if is_tag(&child, "br") {
            out.push('\n');
        } else if child.as_element().is_some() {
            out.push(' ');
            raw_text_into(&child, out);
            out.push(' ');
        }
    }
}
