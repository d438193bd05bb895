//! Direct messages via the `chat.bsky.convo.*` service.
//!
//! Chat calls go through the PDS with the chat service as proxy target.

use super::{convert, detect_links, xrpc_error, BlueskyClient};
use atrium_api::agent::bluesky::AtprotoServiceType;
use atrium_api::app::bsky::richtext::facet;
use atrium_api::chat::bsky::convo::defs::MessageInputData;
use atrium_api::chat::bsky::convo::get_messages::OutputMessagesItem;
use atrium_api::chat::bsky::convo::{get_messages, list_convos, send_message, update_read};
use atrium_api::types::{LimitedNonZeroU8, Union};
use sagemate_core::{
    error::SagemateError,
    message::{ChatMessage, Conversation},
};

const CONVO_PAGE_SIZE: u32 = 50;
const MAX_PAGE: u32 = 100;

fn page_limit(limit: u32) -> Option<LimitedNonZeroU8<100>> {
    u8::try_from(limit.clamp(1, MAX_PAGE))
        .ok()
        .and_then(|n| n.try_into().ok())
}

impl BlueskyClient {
    pub(super) async fn list_convos(&self) -> Result<Vec<Conversation>, SagemateError> {
        let params = list_convos::ParametersData {
            cursor: None,
            limit: page_limit(CONVO_PAGE_SIZE),
        };
        let output = self
            .agent
            .api_with_proxy(self.chat_did.clone(), AtprotoServiceType::BskyChat)
            .chat
            .bsky
            .convo
            .list_convos(params.into())
            .await
            .map_err(xrpc_error("chat.bsky.convo.listConvos"))?;
        Ok(output.convos.iter().map(convert::conversation).collect())
    }

    /// Most recent messages, newest first. Deleted messages are dropped.
    pub(super) async fn convo_messages(
        &self,
        convo_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, SagemateError> {
        let params = get_messages::ParametersData {
            convo_id: convo_id.to_string(),
            cursor: None,
            limit: page_limit(limit),
        };
        let output = self
            .agent
            .api_with_proxy(self.chat_did.clone(), AtprotoServiceType::BskyChat)
            .chat
            .bsky
            .convo
            .get_messages(params.into())
            .await
            .map_err(xrpc_error("chat.bsky.convo.getMessages"))?;
        Ok(output
            .messages
            .iter()
            .filter_map(|m| match m {
                Union::Refs(OutputMessagesItem::ChatBskyConvoDefsMessageView(view)) => {
                    Some(convert::message(view))
                }
                _ => None,
            })
            .collect())
    }

    pub(super) async fn send_chat_message(
        &self,
        convo_id: &str,
        text: &str,
    ) -> Result<(), SagemateError> {
        const NSID: &str = "chat.bsky.convo.sendMessage";
        let links = convert::facets_json(&detect_links(text));
        let facets: Vec<facet::Main> = serde_json::from_value(links.into())
            .map_err(|e| SagemateError::Channel(format!("{NSID}: invalid facets: {e}")))?;
        let input = send_message::InputData {
            convo_id: convo_id.to_string(),
            message: MessageInputData {
                text: text.to_string(),
                facets: (!facets.is_empty()).then_some(facets),
                embed: None,
            }
            .into(),
        };
        self.agent
            .api_with_proxy(self.chat_did.clone(), AtprotoServiceType::BskyChat)
            .chat
            .bsky
            .convo
            .send_message(input.into())
            .await
            .map_err(xrpc_error(NSID))?;
        Ok(())
    }

    pub(super) async fn update_read(&self, convo_id: &str) -> Result<(), SagemateError> {
        let input = update_read::InputData {
            convo_id: convo_id.to_string(),
            message_id: None,
        };
        self.agent
            .api_with_proxy(self.chat_did.clone(), AtprotoServiceType::BskyChat)
            .chat
            .bsky
            .convo
            .update_read(input.into())
            .await
            .map_err(xrpc_error("chat.bsky.convo.updateRead"))?;
        Ok(())
    }
}
