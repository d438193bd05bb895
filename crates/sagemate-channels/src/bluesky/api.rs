//! [`SocialClient`] implementation for [`BlueskyClient`].

use super::{convert, detect_links, parse_param, xrpc_error, BlueskyClient};
use async_trait::async_trait;
use atrium_api::app::bsky::actor::get_profile;
use atrium_api::app::bsky::feed::{get_post_thread, get_posts};
use atrium_api::app::bsky::notification::{list_notifications, update_seen};
use atrium_api::com::atproto::repo::create_record;
use atrium_api::types::string::Nsid;
use atrium_api::types::Unknown;
use chrono::{DateTime, SecondsFormat, Utc};
use sagemate_core::{
    error::SagemateError,
    message::{ChatMessage, Conversation, Notification, Profile},
    post::{Post, ReplyRef, StrongRef, ThreadNode},
    traits::SocialClient,
};
use tracing::debug;

/// The server caps notification pages at 100 and thread ancestry at 1000.
const MAX_NOTIFICATION_PAGE: u32 = 100;
const MAX_PARENT_HEIGHT: u32 = 1000;

#[async_trait]
impl SocialClient for BlueskyClient {
    fn handle(&self) -> &str {
        &self.handle
    }

    fn did(&self) -> &str {
        &self.did
    }

    async fn get_profile(&self, actor: &str) -> Result<Profile, SagemateError> {
        const NSID: &str = "app.bsky.actor.getProfile";
        let params = get_profile::ParametersData {
            actor: parse_param(NSID, "actor", actor)?,
        };
        let output = self
            .agent
            .api
            .app
            .bsky
            .actor
            .get_profile(params.into())
            .await
            .map_err(xrpc_error(NSID))?;
        Ok(convert::profile(&output))
    }

    async fn list_notifications(&self, limit: u32) -> Result<Vec<Notification>, SagemateError> {
        const NSID: &str = "app.bsky.notification.listNotifications";
        let limit = u8::try_from(limit.clamp(1, MAX_NOTIFICATION_PAGE))
            .ok()
            .and_then(|n| n.try_into().ok());
        let params = list_notifications::ParametersData {
            cursor: None,
            limit,
            priority: None,
            reasons: None,
            seen_at: None,
        };
        let output = self
            .agent
            .api
            .app
            .bsky
            .notification
            .list_notifications(params.into())
            .await
            .map_err(xrpc_error(NSID))?;
        Ok(output
            .notifications
            .iter()
            .map(convert::notification)
            .collect())
    }

    async fn get_thread(
        &self,
        uri: &str,
        parent_height: u32,
    ) -> Result<ThreadNode, SagemateError> {
        const NSID: &str = "app.bsky.feed.getPostThread";
        let parent_height = u16::try_from(parent_height.min(MAX_PARENT_HEIGHT))
            .ok()
            .and_then(|n| n.try_into().ok());
        let params = get_post_thread::ParametersData {
            uri: parse_param(NSID, "uri", uri)?,
            depth: 0u16.try_into().ok(),
            parent_height,
        };
        let output = self
            .agent
            .api
            .app
            .bsky
            .feed
            .get_post_thread(params.into())
            .await
            .map_err(xrpc_error(NSID))?;
        convert::thread(&output.thread)
            .ok_or_else(|| SagemateError::Channel(format!("thread {uri} is not available")))
    }

    async fn get_post(&self, uri: &str) -> Result<Post, SagemateError> {
        const NSID: &str = "app.bsky.feed.getPosts";
        let params = get_posts::ParametersData {
            uris: vec![parse_param(NSID, "uri", uri)?],
        };
        let output = self
            .agent
            .api
            .app
            .bsky
            .feed
            .get_posts(params.into())
            .await
            .map_err(xrpc_error(NSID))?;
        output
            .posts
            .first()
            .map(convert::post_view)
            .ok_or_else(|| SagemateError::Channel(format!("post {uri} not found")))
    }

    async fn send_post(
        &self,
        text: &str,
        reply: Option<&ReplyRef>,
    ) -> Result<StrongRef, SagemateError> {
        const NSID: &str = "com.atproto.repo.createRecord";
        let record = convert::new_post_record(text, Utc::now(), reply, &detect_links(text));
        let record: Unknown = serde_json::from_value(record)
            .map_err(|e| SagemateError::Channel(format!("{NSID}: invalid record: {e}")))?;
        let collection = Nsid::new(convert::POST_COLLECTION.to_string())
            .map_err(|e| SagemateError::Channel(format!("{NSID}: invalid collection: {e}")))?;
        let input = create_record::InputData {
            collection,
            record,
            repo: self.repo.clone().into(),
            rkey: None,
            swap_commit: None,
            validate: None,
        };
        let output = self
            .agent
            .api
            .com
            .atproto
            .repo
            .create_record(input.into())
            .await
            .map_err(xrpc_error(NSID))?;
        debug!("bluesky: created {}", output.uri);
        Ok(StrongRef {
            uri: output.uri.clone(),
            cid: output.cid.as_ref().to_string(),
        })
    }

    async fn mark_notifications_seen(&self, seen_at: DateTime<Utc>) -> Result<(), SagemateError> {
        const NSID: &str = "app.bsky.notification.updateSeen";
        let seen_at = seen_at.to_rfc3339_opts(SecondsFormat::Millis, true);
        let input = update_seen::InputData {
            seen_at: parse_param(NSID, "seenAt", &seen_at)?,
        };
        self.agent
            .api
            .app
            .bsky
            .notification
            .update_seen(input.into())
            .await
            .map_err(xrpc_error(NSID))
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, SagemateError> {
        self.list_convos().await
    }

    async fn get_messages(
        &self,
        convo_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, SagemateError> {
        self.convo_messages(convo_id, limit).await
    }

    async fn send_message(&self, convo_id: &str, text: &str) -> Result<(), SagemateError> {
        self.send_chat_message(convo_id, text).await
    }

    async fn mark_conversation_read(&self, convo_id: &str) -> Result<(), SagemateError> {
        self.update_read(convo_id).await
    }
}
