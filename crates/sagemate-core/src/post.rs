//! Read-only model of social-network posts.
//!
//! Every optional substructure of the remote schema (facets, embeds, reply
//! links) is an explicit `Option` or a defaulted `Vec`, so callers never test
//! for presence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A content-addressed reference to a record: its URI plus content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

/// The account that authored a post or message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Reply linkage of a post: the thread root and the direct parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub root: StrongRef,
    pub parent: StrongRef,
}

/// A single feature of a facet annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacetFeature {
    Link { uri: String },
    Mention { did: String },
    Tag { tag: String },
    /// A feature type this client does not understand.
    Other,
}

/// A structured annotation over a byte span of a post's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub byte_start: usize,
    pub byte_end: usize,
    #[serde(default)]
    pub features: Vec<FacetFeature>,
}

impl Facet {
    /// Build a link facet covering `byte_start..byte_end`.
    pub fn link(byte_start: usize, byte_end: usize, uri: &str) -> Self {
        Self {
            byte_start,
            byte_end,
            features: vec![FacetFeature::Link {
                uri: uri.to_string(),
            }],
        }
    }
}

/// Non-text content attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Embed {
    /// External link card.
    External {
        uri: String,
        #[serde(default)]
        title: String,
        #[serde(default)]
        description: String,
    },
    /// Quoted post. `post` is present when the server hydrated the quote.
    Record {
        target: StrongRef,
        post: Option<Box<Post>>,
    },
    /// Quoted post combined with images or video.
    RecordWithMedia {
        target: StrongRef,
        post: Option<Box<Post>>,
    },
    Images,
    Other,
}

impl Embed {
    /// The quoted post reference and its hydrated record, if this embed quotes one.
    pub fn quoted(&self) -> Option<(&StrongRef, Option<&Post>)> {
        match self {
            Self::Record { target, post } | Self::RecordWithMedia { target, post } => {
                Some((target, post.as_deref()))
            }
            _ => None,
        }
    }
}

/// A post as seen by the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub uri: String,
    pub cid: String,
    pub author: Author,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub facets: Vec<Facet>,
    #[serde(default)]
    pub embed: Option<Embed>,
    #[serde(default)]
    pub reply: Option<ReplyRef>,
}

impl Post {
    /// Strong reference to this post.
    pub fn strong_ref(&self) -> StrongRef {
        StrongRef {
            uri: self.uri.clone(),
            cid: self.cid.clone(),
        }
    }

    /// The reply reference a new post needs to answer this one.
    ///
    /// The parent is this post; the root is inherited when this post is
    /// itself a reply.
    pub fn reply_ref_for_answer(&self) -> ReplyRef {
        let parent = self.strong_ref();
        let root = self
            .reply
            .as_ref()
            .map(|r| r.root.clone())
            .unwrap_or_else(|| parent.clone());
        ReplyRef { root, parent }
    }
}

/// A node of a thread view: a post and, walking upward, its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadNode {
    pub post: Post,
    pub parent: Option<Box<ThreadNode>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(uri: &str, reply: Option<ReplyRef>) -> Post {
        Post {
            uri: uri.into(),
            cid: format!("cid-{uri}"),
            author: Author::default(),
            text: String::new(),
            created_at: None,
            facets: Vec::new(),
            embed: None,
            reply,
        }
    }

    #[test]
    fn test_reply_ref_for_top_level_post_uses_post_as_root() {
        let p = post("at://a/1", None);
        let r = p.reply_ref_for_answer();
        assert_eq!(r.root.uri, "at://a/1");
        assert_eq!(r.parent.uri, "at://a/1");
    }

    #[test]
    fn test_reply_ref_for_reply_inherits_root() {
        let root = StrongRef {
            uri: "at://a/root".into(),
            cid: "cid-root".into(),
        };
        let p = post(
            "at://a/2",
            Some(ReplyRef {
                root: root.clone(),
                parent: root.clone(),
            }),
        );
        let r = p.reply_ref_for_answer();
        assert_eq!(r.root, root);
        assert_eq!(r.parent.uri, "at://a/2");
        assert_eq!(r.parent.cid, "cid-at://a/2");
    }

    #[test]
    fn test_embed_quoted() {
        let target = StrongRef {
            uri: "at://q/1".into(),
            cid: "c".into(),
        };
        let embed = Embed::RecordWithMedia {
            target: target.clone(),
            post: None,
        };
        let (t, p) = embed.quoted().unwrap();
        assert_eq!(t, &target);
        assert!(p.is_none());
        assert!(Embed::Images.quoted().is_none());
    }
}
