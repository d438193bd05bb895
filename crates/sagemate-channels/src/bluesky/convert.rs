//! Conversion of atrium's generated types into the core model.

use atrium_api::app::bsky::embed::record::{ViewRecordEmbedsItem, ViewRecordRefs};
use atrium_api::app::bsky::feed::defs::{PostView, PostViewEmbedRefs, ThreadViewPost, ThreadViewPostParentRefs};
use atrium_api::app::bsky::feed::get_post_thread::OutputThreadRefs;
use atrium_api::app::bsky::feed::post::{RecordData, RecordEmbedRefs};
use atrium_api::app::bsky::notification::list_notifications;
use atrium_api::app::bsky::richtext::facet::{self, MainFeaturesItem};
use atrium_api::chat::bsky::convo::defs::{ConvoView, MessageView, MessageViewEmbedRefs};
use atrium_api::types::string::{Did, Handle};
use atrium_api::types::{Union, Unknown};
use chrono::{DateTime, Utc};
use sagemate_core::{
    message::{ChatMessage, Conversation, Notification, Profile},
    post::{Author, Embed, Facet, FacetFeature, Post, ReplyRef, StrongRef, ThreadNode},
};
use serde_json::{json, Value};

pub(crate) const POST_COLLECTION: &str = "app.bsky.feed.post";

fn author(did: &Did, handle: &Handle, display_name: &Option<String>) -> Author {
    Author {
        did: did.to_string(),
        handle: handle.to_string(),
        display_name: display_name.clone().filter(|n| !n.is_empty()),
    }
}

pub(crate) fn profile(view: &atrium_api::app::bsky::actor::defs::ProfileViewDetailed) -> Profile {
    Profile {
        did: view.did.to_string(),
        handle: view.handle.to_string(),
        display_name: view.display_name.clone().filter(|n| !n.is_empty()),
        followers_count: view
            .followers_count
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0),
    }
}

/// Parse an RFC 3339 timestamp, tolerating the offset forms the network emits.
pub(crate) fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn facets(list: &Option<Vec<facet::Main>>) -> Vec<Facet> {
    list.iter().flatten().map(facet_from).collect()
}

fn facet_from(f: &facet::Main) -> Facet {
    let features = f
        .features
        .iter()
        .map(|feature| match feature {
            Union::Refs(MainFeaturesItem::Link(link)) => FacetFeature::Link {
                uri: link.uri.clone(),
            },
            Union::Refs(MainFeaturesItem::Mention(mention)) => FacetFeature::Mention {
                did: mention.did.to_string(),
            },
            Union::Refs(MainFeaturesItem::Tag(tag)) => FacetFeature::Tag {
                tag: tag.tag.clone(),
            },
            _ => FacetFeature::Other,
        })
        .collect();
    Facet {
        byte_start: f.index.byte_start,
        byte_end: f.index.byte_end,
        features,
    }
}

/// Rich-text facets in the network's JSON form, for outgoing records.
pub(crate) fn facets_json(list: &[Facet]) -> Vec<Value> {
    list.iter()
        .map(|f| {
            let features: Vec<Value> = f
                .features
                .iter()
                .filter_map(|feature| match feature {
                    FacetFeature::Link { uri } => {
                        Some(json!({"$type": "app.bsky.richtext.facet#link", "uri": uri}))
                    }
                    FacetFeature::Mention { did } => {
                        Some(json!({"$type": "app.bsky.richtext.facet#mention", "did": did}))
                    }
                    FacetFeature::Tag { tag } => {
                        Some(json!({"$type": "app.bsky.richtext.facet#tag", "tag": tag}))
                    }
                    FacetFeature::Other => None,
                })
                .collect();
            json!({
                "index": {"byteStart": f.byte_start, "byteEnd": f.byte_end},
                "features": features,
            })
        })
        .collect()
}

/// The `app.bsky.feed.post` record for a new post.
pub(crate) fn new_post_record(
    text: &str,
    created_at: DateTime<Utc>,
    reply: Option<&ReplyRef>,
    facets: &[Facet],
) -> Value {
    let mut record = json!({
        "$type": POST_COLLECTION,
        "text": text,
        "createdAt": created_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    });
    if let Some(reply) = reply {
        record["reply"] = json!({
            "root": {"uri": reply.root.uri, "cid": reply.root.cid},
            "parent": {"uri": reply.parent.uri, "cid": reply.parent.cid},
        });
    }
    if !facets.is_empty() {
        record["facets"] = Value::Array(facets_json(facets));
    }
    record
}

fn record_embed(embed: &Union<RecordEmbedRefs>) -> Embed {
    match embed {
        Union::Refs(RecordEmbedRefs::AppBskyEmbedExternalMain(main)) => Embed::External {
            uri: main.external.uri.clone(),
            title: main.external.title.clone(),
            description: main.external.description.clone(),
        },
        Union::Refs(RecordEmbedRefs::AppBskyEmbedRecordMain(main)) => Embed::Record {
            target: StrongRef {
                uri: main.record.uri.clone(),
                cid: main.record.cid.as_ref().to_string(),
            },
            post: None,
        },
        Union::Refs(RecordEmbedRefs::AppBskyEmbedRecordWithMediaMain(main)) => {
            Embed::RecordWithMedia {
                target: StrongRef {
                    uri: main.record.record.uri.clone(),
                    cid: main.record.record.cid.as_ref().to_string(),
                },
                post: None,
            }
        }
        Union::Refs(RecordEmbedRefs::AppBskyEmbedImagesMain(_)) => Embed::Images,
        _ => Embed::Other,
    }
}

/// Build a post from a raw record and its identity.
///
/// A record that does not parse as a post keeps only its text.
fn post_from_record(record: &Unknown, uri: &str, cid: String, author: Author) -> Post {
    let value = serde_json::to_value(record).unwrap_or(Value::Null);
    let mut post = Post {
        uri: uri.to_string(),
        cid,
        author,
        text: String::new(),
        created_at: None,
        facets: Vec::new(),
        embed: None,
        reply: None,
    };
    match serde_json::from_value::<RecordData>(value.clone()) {
        Ok(data) => {
            post.text = data.text;
            post.created_at = parse_time(data.created_at.as_str());
            post.facets = facets(&data.facets);
            post.embed = data.embed.as_ref().map(record_embed);
            post.reply = data.reply.as_ref().map(|r| ReplyRef {
                root: StrongRef {
                    uri: r.root.uri.clone(),
                    cid: r.root.cid.as_ref().to_string(),
                },
                parent: StrongRef {
                    uri: r.parent.uri.clone(),
                    cid: r.parent.cid.as_ref().to_string(),
                },
            });
        }
        Err(_) => {
            post.text = value
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
        }
    }
    post
}

/// Hydrate a quoted record into a post. Its own embed comes from the view
/// when present, else from the raw record.
fn quoted_post(record: &Union<ViewRecordRefs>) -> Option<Post> {
    let Union::Refs(ViewRecordRefs::ViewRecord(view)) = record else {
        return None;
    };
    let mut post = post_from_record(
        &view.value,
        &view.uri,
        view.cid.as_ref().to_string(),
        author(&view.author.did, &view.author.handle, &view.author.display_name),
    );
    let hydrated = view
        .embeds
        .iter()
        .flatten()
        .next()
        .map(view_record_embed);
    if hydrated.is_some() {
        post.embed = hydrated;
    }
    Some(post)
}

fn quote_embed(record: &Union<ViewRecordRefs>, with_media: bool) -> Embed {
    match (quoted_post(record), with_media) {
        (Some(post), false) => Embed::Record {
            target: post.strong_ref(),
            post: Some(Box::new(post)),
        },
        (Some(post), true) => Embed::RecordWithMedia {
            target: post.strong_ref(),
            post: Some(Box::new(post)),
        },
        (None, false) => Embed::Other,
        (None, true) => Embed::Images,
    }
}

fn view_record_embed(embed: &Union<ViewRecordEmbedsItem>) -> Embed {
    match embed {
        Union::Refs(ViewRecordEmbedsItem::AppBskyEmbedExternalView(view)) => Embed::External {
            uri: view.external.uri.clone(),
            title: view.external.title.clone(),
            description: view.external.description.clone(),
        },
        Union::Refs(ViewRecordEmbedsItem::AppBskyEmbedRecordView(view)) => {
            quote_embed(&view.record, false)
        }
        Union::Refs(ViewRecordEmbedsItem::AppBskyEmbedRecordWithMediaView(view)) => {
            quote_embed(&view.record.record, true)
        }
        Union::Refs(ViewRecordEmbedsItem::AppBskyEmbedImagesView(_)) => Embed::Images,
        _ => Embed::Other,
    }
}

fn post_view_embed(embed: &Union<PostViewEmbedRefs>) -> Embed {
    match embed {
        Union::Refs(PostViewEmbedRefs::AppBskyEmbedExternalView(view)) => Embed::External {
            uri: view.external.uri.clone(),
            title: view.external.title.clone(),
            description: view.external.description.clone(),
        },
        Union::Refs(PostViewEmbedRefs::AppBskyEmbedRecordView(view)) => {
            quote_embed(&view.record, false)
        }
        Union::Refs(PostViewEmbedRefs::AppBskyEmbedRecordWithMediaView(view)) => {
            quote_embed(&view.record.record, true)
        }
        Union::Refs(PostViewEmbedRefs::AppBskyEmbedImagesView(_)) => Embed::Images,
        _ => Embed::Other,
    }
}

/// Convert a hydrated post view. The view's embed wins over the record's.
pub(crate) fn post_view(view: &PostView) -> Post {
    let mut post = post_from_record(
        &view.record,
        &view.uri,
        view.cid.as_ref().to_string(),
        author(&view.author.did, &view.author.handle, &view.author.display_name),
    );
    if let Some(embed) = &view.embed {
        post.embed = Some(post_view_embed(embed));
    }
    post
}

/// Convert a thread view. Not-found and blocked ancestors end the chain.
pub(crate) fn thread(thread: &Union<OutputThreadRefs>) -> Option<ThreadNode> {
    match thread {
        Union::Refs(OutputThreadRefs::AppBskyFeedDefsThreadViewPost(view)) => {
            Some(thread_view(view))
        }
        _ => None,
    }
}

fn thread_view(view: &ThreadViewPost) -> ThreadNode {
    let parent = match &view.parent {
        Some(Union::Refs(ThreadViewPostParentRefs::ThreadViewPost(parent))) => {
            Some(Box::new(thread_view(parent)))
        }
        _ => None,
    };
    ThreadNode {
        post: post_view(&view.post),
        parent,
    }
}

fn is_post_record(record: &Unknown) -> bool {
    let Unknown::Object(map) = record else {
        return false;
    };
    map.get("$type")
        .and_then(|t| serde_json::to_value(t).ok())
        .is_some_and(|t| t.as_str() == Some(POST_COLLECTION))
}

/// Convert a notification. Records that are not posts (likes, follows,
/// reposts) carry no post.
pub(crate) fn notification(n: &list_notifications::Notification) -> Notification {
    let author = author(&n.author.did, &n.author.handle, &n.author.display_name);
    let post = is_post_record(&n.record).then(|| {
        post_from_record(&n.record, &n.uri, n.cid.as_ref().to_string(), author.clone())
    });
    Notification {
        uri: n.uri.clone(),
        reason: n.reason.clone(),
        is_read: n.is_read,
        indexed_at: parse_time(n.indexed_at.as_str()).unwrap_or_else(Utc::now),
        author,
        post,
    }
}

pub(crate) fn conversation(c: &ConvoView) -> Conversation {
    Conversation {
        id: c.id.clone(),
        unread_count: u32::try_from(c.unread_count.max(0)).unwrap_or(u32::MAX),
        members: c
            .members
            .iter()
            .map(|m| author(&m.did, &m.handle, &m.display_name))
            .collect(),
    }
}

pub(crate) fn message(m: &MessageView) -> ChatMessage {
    let embed = match &m.embed {
        Some(Union::Refs(MessageViewEmbedRefs::AppBskyEmbedRecordView(view))) => {
            Some(quote_embed(&view.record, false))
        }
        Some(_) => Some(Embed::Other),
        None => None,
    };
    ChatMessage {
        id: m.id.clone(),
        sender_did: m.sender.did.to_string(),
        text: m.text.clone(),
        facets: facets(&m.facets),
        embed,
        sent_at: parse_time(m.sent_at.as_str()),
    }
}
