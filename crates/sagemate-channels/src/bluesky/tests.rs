use super::*;
use atrium_api::app::bsky::feed::defs::PostView;
use atrium_api::app::bsky::feed::get_post_thread;
use atrium_api::app::bsky::notification::list_notifications;
use atrium_api::app::bsky::richtext::facet::{self, MainFeaturesItem};
use atrium_api::chat::bsky::convo::defs::ConvoView;
use atrium_api::chat::bsky::convo::get_messages;
use atrium_api::types::Union;
use chrono::{TimeZone, Utc};
use sagemate_core::post::{Embed, FacetFeature, ReplyRef, StrongRef};
use serde_json::json;

const CID: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

fn author_json(name: &str) -> serde_json::Value {
    json!({ "did": format!("did:plc:{name}"), "handle": format!("{name}.bsky.social") })
}

fn post_view_json(uri: &str, text: &str) -> serde_json::Value {
    json!({
        "uri": uri,
        "cid": CID,
        "author": { "did": "did:plc:alice", "handle": "alice.bsky.social", "displayName": "Alice" },
        "record": {
            "$type": "app.bsky.feed.post",
            "text": text,
            "createdAt": "2024-05-01T12:00:00.000Z"
        },
        "indexedAt": "2024-05-01T12:00:01.000Z"
    })
}

fn thread_json(thread: serde_json::Value) -> Option<sagemate_core::post::ThreadNode> {
    let output: get_post_thread::OutputData =
        serde_json::from_value(json!({ "thread": thread })).unwrap();
    convert::thread(&output.thread)
}

#[test]
fn test_notification_mention_carries_post() {
    let output: list_notifications::OutputData = serde_json::from_value(json!({
        "notifications": [{
            "uri": "at://did:plc:bob/app.bsky.feed.post/1",
            "cid": CID,
            "author": author_json("bob"),
            "reason": "mention",
            "record": {
                "$type": "app.bsky.feed.post",
                "text": "@sage what about https://example.com/a",
                "createdAt": "2024-05-01T12:00:00.000Z",
                "facets": [{
                    "index": { "byteStart": 17, "byteEnd": 38 },
                    "features": [{ "$type": "app.bsky.richtext.facet#link", "uri": "https://example.com/a" }]
                }],
                "reply": {
                    "root": { "uri": "at://did:plc:bob/app.bsky.feed.post/root", "cid": CID },
                    "parent": { "uri": "at://did:plc:bob/app.bsky.feed.post/parent", "cid": CID }
                }
            },
            "isRead": false,
            "indexedAt": "2024-05-01T12:00:02.000Z"
        }, {
            "uri": "at://did:plc:carol/app.bsky.feed.like/2",
            "cid": CID,
            "author": author_json("carol"),
            "reason": "like",
            "record": {
                "$type": "app.bsky.feed.like",
                "subject": { "uri": "at://did:plc:sage/app.bsky.feed.post/9", "cid": CID },
                "createdAt": "2024-05-01T11:00:00.000Z"
            },
            "isRead": true,
            "indexedAt": "2024-05-01T11:00:00.000Z"
        }]
    }))
    .unwrap();
    let notifications: Vec<_> = output
        .notifications
        .iter()
        .map(convert::notification)
        .collect();

    let mention = &notifications[0];
    assert_eq!(mention.reason, "mention");
    assert!(!mention.is_read);
    assert_eq!(
        mention.indexed_at,
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 2).unwrap()
    );
    let post = mention.post.as_ref().unwrap();
    assert_eq!(post.uri, "at://did:plc:bob/app.bsky.feed.post/1");
    assert_eq!(post.cid, CID);
    assert_eq!(post.author.handle, "bob.bsky.social");
    assert_eq!(
        post.facets[0].features,
        vec![FacetFeature::Link {
            uri: "https://example.com/a".into()
        }]
    );
    assert_eq!(
        post.reply.as_ref().unwrap().root.uri,
        "at://did:plc:bob/app.bsky.feed.post/root"
    );
    assert!(post.created_at.is_some());

    let like = &notifications[1];
    assert!(like.post.is_none(), "likes carry no post");
    assert!(like.is_read);
}

#[test]
fn test_thread_converts_parent_chain() {
    let node = thread_json(json!({
        "$type": "app.bsky.feed.defs#threadViewPost",
        "post": post_view_json("at://did:plc:alice/app.bsky.feed.post/c", "third"),
        "parent": {
            "$type": "app.bsky.feed.defs#threadViewPost",
            "post": post_view_json("at://did:plc:alice/app.bsky.feed.post/b", "second"),
            "parent": {
                "$type": "app.bsky.feed.defs#threadViewPost",
                "post": post_view_json("at://did:plc:alice/app.bsky.feed.post/a", "first")
            }
        }
    }))
    .unwrap();
    assert_eq!(node.post.text, "third");
    let parent = node.parent.as_ref().unwrap();
    assert_eq!(parent.post.text, "second");
    let grandparent = parent.parent.as_ref().unwrap();
    assert_eq!(grandparent.post.text, "first");
    assert!(grandparent.parent.is_none());
}

#[test]
fn test_thread_blocked_parent_ends_chain() {
    let node = thread_json(json!({
        "$type": "app.bsky.feed.defs#threadViewPost",
        "post": post_view_json("at://did:plc:alice/app.bsky.feed.post/c", "reply"),
        "parent": {
            "$type": "app.bsky.feed.defs#blockedPost",
            "uri": "at://did:plc:bob/app.bsky.feed.post/b",
            "blocked": true,
            "author": { "did": "did:plc:bob" }
        }
    }))
    .unwrap();
    assert_eq!(node.post.text, "reply");
    assert!(node.parent.is_none());
}

#[test]
fn test_thread_not_found_root() {
    let node = thread_json(json!({
        "$type": "app.bsky.feed.defs#notFoundPost",
        "uri": "at://did:plc:bob/app.bsky.feed.post/gone",
        "notFound": true
    }));
    assert!(node.is_none());
}

#[test]
fn test_post_view_hydrates_quote_and_external() {
    let mut quoting = post_view_json("at://did:plc:alice/app.bsky.feed.post/q", "quoting");
    quoting["embed"] = json!({
        "$type": "app.bsky.embed.record#view",
        "record": {
            "$type": "app.bsky.embed.record#viewRecord",
            "uri": "at://did:plc:dan/app.bsky.feed.post/inner",
            "cid": CID,
            "author": author_json("dan"),
            "value": { "$type": "app.bsky.feed.post", "text": "inner https://inner.example" },
            "embeds": [{
                "$type": "app.bsky.embed.external#view",
                "external": { "uri": "https://card.example", "title": "Card", "description": "" }
            }],
            "indexedAt": "2024-05-01T12:00:00.000Z"
        }
    });
    let view: PostView = serde_json::from_value(quoting).unwrap();
    let post = convert::post_view(&view);

    let (target, inner) = post.embed.as_ref().unwrap().quoted().unwrap();
    assert_eq!(target.uri, "at://did:plc:dan/app.bsky.feed.post/inner");
    assert_eq!(target.cid, CID);
    let inner = inner.unwrap();
    // The quoted record has no createdAt, so only its text survives.
    assert_eq!(inner.text, "inner https://inner.example");
    assert_eq!(inner.author.handle, "dan.bsky.social");
    assert_eq!(
        inner.embed,
        Some(Embed::External {
            uri: "https://card.example".into(),
            title: "Card".into(),
            description: String::new(),
        })
    );
}

#[test]
fn test_record_embed_used_when_view_has_none() {
    let mut json = post_view_json("at://did:plc:alice/app.bsky.feed.post/p", "look");
    json["record"]["embed"] = json!({
        "$type": "app.bsky.embed.record",
        "record": { "uri": "at://did:plc:bob/app.bsky.feed.post/x", "cid": CID }
    });
    let view: PostView = serde_json::from_value(json).unwrap();
    let post = convert::post_view(&view);
    let (target, hydrated) = post.embed.as_ref().unwrap().quoted().unwrap();
    assert_eq!(target.uri, "at://did:plc:bob/app.bsky.feed.post/x");
    assert!(hydrated.is_none());
}

#[test]
fn test_unknown_embed_and_feature_types_are_tolerated() {
    let mut json = post_view_json("at://did:plc:alice/app.bsky.feed.post/p", "hello");
    json["record"]["facets"] = json!([{
        "index": { "byteStart": 0, "byteEnd": 5 },
        "features": [{ "$type": "app.bsky.richtext.facet#future", "x": 1 }]
    }]);
    json["embed"] = json!({ "$type": "app.bsky.embed.future#view", "x": 1 });
    let view: PostView = serde_json::from_value(json).unwrap();
    let post = convert::post_view(&view);
    assert_eq!(post.facets[0].features, vec![FacetFeature::Other]);
    assert_eq!(post.embed, Some(Embed::Other));
}

#[test]
fn test_messages_skip_deleted() {
    let output: get_messages::OutputData = serde_json::from_value(json!({
        "messages": [
            { "$type": "chat.bsky.convo.defs#messageView", "id": "m2", "rev": "2",
              "text": "and this?", "sender": { "did": "did:plc:bob" },
              "sentAt": "2024-05-01T12:00:00.000Z" },
            { "$type": "chat.bsky.convo.defs#deletedMessageView", "id": "m1", "rev": "1",
              "sender": { "did": "did:plc:bob" }, "sentAt": "2024-05-01T11:00:00.000Z" }
        ]
    }))
    .unwrap();
    let messages: Vec<_> = output
        .messages
        .iter()
        .filter_map(|m| match m {
            Union::Refs(get_messages::OutputMessagesItem::ChatBskyConvoDefsMessageView(view)) => {
                Some(convert::message(view))
            }
            _ => None,
        })
        .collect();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, "m2");
    assert_eq!(messages[0].sender_did, "did:plc:bob");
    assert_eq!(messages[0].text, "and this?");
    assert!(messages[0].sent_at.is_some());
}

#[test]
fn test_convo_view_conversion() {
    let view: ConvoView = serde_json::from_value(json!({
        "id": "c1", "rev": "r", "unreadCount": 2, "muted": false,
        "members": [author_json("bob")]
    }))
    .unwrap();
    let convo = convert::conversation(&view);
    assert_eq!(convo.id, "c1");
    assert_eq!(convo.unread_count, 2);
    assert_eq!(convo.handle_of("did:plc:bob"), "bob.bsky.social");
}

#[test]
fn test_new_post_record_shape() {
    let text = "read https://example.com.";
    let reply = ReplyRef {
        root: StrongRef {
            uri: "at://root".into(),
            cid: "r".into(),
        },
        parent: StrongRef {
            uri: "at://parent".into(),
            cid: "p".into(),
        },
    };
    let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let json = convert::new_post_record(text, created, Some(&reply), &detect_links(text));
    assert_eq!(json["$type"], "app.bsky.feed.post");
    assert_eq!(json["createdAt"], "2024-05-01T12:00:00.000Z");
    assert_eq!(json["reply"]["parent"]["uri"], "at://parent");
    assert_eq!(json["facets"][0]["index"]["byteStart"], 5);
    assert_eq!(json["facets"][0]["index"]["byteEnd"], 24);
    assert_eq!(
        json["facets"][0]["features"][0]["$type"],
        "app.bsky.richtext.facet#link"
    );
    assert_eq!(json["facets"][0]["features"][0]["uri"], "https://example.com");
}

#[test]
fn test_new_post_record_omits_empty_parts() {
    let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let json = convert::new_post_record("plain", created, None, &[]);
    assert!(json.get("reply").is_none());
    assert!(json.get("facets").is_none());
}

#[test]
fn test_outgoing_facets_parse_as_richtext() {
    let text = "both https://a.example and https://b.example";
    let facets: Vec<facet::Main> =
        serde_json::from_value(convert::facets_json(&detect_links(text)).into()).unwrap();
    assert_eq!(facets.len(), 2);
    assert_eq!(facets[1].index.byte_start, text.find("https://b").unwrap());
    match &facets[0].features[0] {
        Union::Refs(MainFeaturesItem::Link(link)) => assert_eq!(link.uri, "https://a.example"),
        other => panic!("expected link feature, got {other:?}"),
    }
}

#[test]
fn test_detect_links_uses_byte_offsets() {
    let text = "café → https://example.com/ü ok";
    let facets = detect_links(text);
    assert_eq!(facets.len(), 1);
    let f = &facets[0];
    assert_eq!(&text[f.byte_start..f.byte_end], "https://example.com/ü");
    assert_eq!(f.byte_start, text.find("https").unwrap());
}

#[test]
fn test_detect_links_trims_sentence_punctuation() {
    let facets = detect_links("see (https://a.example/x), then http://b.example!");
    let uris: Vec<_> = facets
        .iter()
        .map(|f| match &f.features[0] {
            FacetFeature::Link { uri } => uri.as_str(),
            _ => "",
        })
        .collect();
    assert_eq!(uris, vec!["https://a.example/x", "http://b.example"]);
}

#[test]
fn test_detect_links_none() {
    assert!(detect_links("no links here, just https:// alone").is_empty());
}

fn failure(status: u16, error: &str, message: &str) -> Failure {
    Failure {
        status: Some(status),
        error: error.into(),
        message: message.into(),
    }
}

#[test]
fn test_classify_chat_scope_is_unsupported() {
    let f = failure(400, "InvalidToken", "Bad token scope");
    assert!(classify_error("chat.bsky.convo.listConvos", &f).is_unsupported());
    let f = failure(401, "InvalidToken", "");
    assert!(classify_error("chat.bsky.convo.listConvos", &f).is_unsupported());
}

#[test]
fn test_classify_not_implemented_is_unsupported() {
    let f = failure(400, "MethodNotImplemented", "");
    assert!(classify_error("chat.bsky.convo.getMessages", &f).is_unsupported());
    let f = failure(501, "", "");
    assert!(classify_error("app.bsky.feed.getPosts", &f).is_unsupported());
}

#[test]
fn test_classify_other_errors_are_channel_errors() {
    let f = failure(400, "InvalidToken", "token invalid");
    let err = classify_error("app.bsky.feed.getPosts", &f);
    assert!(matches!(err, SagemateError::Channel(_)));
    assert!(err.to_string().contains("app.bsky.feed.getPosts failed (400)"));

    let transport = Failure {
        message: "connection reset".into(),
        ..Default::default()
    };
    let err = classify_error("app.bsky.feed.getPosts", &transport);
    assert!(matches!(err, SagemateError::Channel(_)));
    assert!(err.to_string().contains("no response"));
}
