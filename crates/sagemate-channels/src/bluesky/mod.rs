//! Bluesky client on top of atrium's AT Protocol agent.
//!
//! The agent logs in with an app password and refreshes the session on its
//! own when the access token expires. Direct messages go through the chat
//! service proxy. Everything atrium returns is converted into the core model
//! in [`convert`], so the rest of the app never sees atrium types.

mod api;
mod chat;
pub(crate) mod convert;
pub(crate) mod facets;

#[cfg(test)]
mod tests;

pub use facets::detect_links;

use atrium_api::agent::bluesky::BSKY_CHAT_DID;
use atrium_api::agent::store::MemorySessionStore;
use atrium_api::agent::AtpAgent;
use atrium_api::types::string::Did;
use atrium_api::xrpc::error::{Error as XrpcError, XrpcErrorKind};
use atrium_xrpc_client::reqwest::{ReqwestClient, ReqwestClientBuilder};
use sagemate_core::{config::BlueskyConfig, error::SagemateError};
use std::fmt::{Debug, Display};
use std::time::Duration;
use tracing::info;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type Agent = AtpAgent<MemorySessionStore, ReqwestClient>;

/// A logged-in Bluesky account.
pub struct BlueskyClient {
    agent: Agent,
    handle: String,
    did: String,
    /// The account DID, typed for record writes.
    repo: Did,
    chat_did: Did,
}

impl BlueskyClient {
    /// Log in with the configured handle and app password.
    pub async fn login(config: &BlueskyConfig) -> Result<Self, SagemateError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SagemateError::Channel(format!("bluesky: client build failed: {e}")))?;
        let service_url = config.service_url.trim_end_matches('/');
        let client = ReqwestClientBuilder::new(service_url).client(http).build();
        let agent = AtpAgent::new(client, MemorySessionStore::default());

        let session = agent
            .login(&config.handle, &config.password)
            .await
            .map_err(|e| SagemateError::Channel(format!("login failed: {e}")))?;
        let chat_did: Did = BSKY_CHAT_DID
            .parse()
            .map_err(|e| SagemateError::Channel(format!("invalid chat service DID: {e}")))?;

        let handle = session.data.handle.to_string();
        let did = session.data.did.to_string();
        info!("bluesky: logged in as @{handle} ({did})");

        Ok(Self {
            agent,
            handle,
            did,
            repo: session.data.did.clone(),
            chat_did,
        })
    }
}

/// The parts of a failed call that decide how it is reported.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Failure {
    /// HTTP status, absent when no response arrived.
    pub status: Option<u16>,
    /// XRPC error name, e.g. `ExpiredToken`.
    pub error: String,
    pub message: String,
}

impl Failure {
    fn of<E>(err: &XrpcError<E>) -> Self
    where
        E: Debug,
        XrpcError<E>: Display,
    {
        let XrpcError::XrpcResponse(response) = err else {
            return Self {
                message: err.to_string(),
                ..Default::default()
            };
        };
        let (error, message) = match &response.error {
            Some(XrpcErrorKind::Undefined(body)) => (
                body.error.clone().unwrap_or_default(),
                body.message.clone().unwrap_or_default(),
            ),
            Some(XrpcErrorKind::Custom(custom)) => {
                let detail = format!("{custom:?}");
                let name = detail.split('(').next().unwrap_or_default().to_string();
                (name, detail)
            }
            None => (String::new(), String::new()),
        };
        Self {
            status: Some(response.status.as_u16()),
            error,
            message,
        }
    }
}

/// Map a failed call of `nsid` to a [`SagemateError`].
///
/// Failures meaning the capability is absent for these credentials (the
/// method is not implemented, or an app password without chat scope hitting
/// the chat service) become [`SagemateError::Unsupported`].
pub(crate) fn classify_error(nsid: &str, failure: &Failure) -> SagemateError {
    let is_chat = nsid.starts_with("chat.bsky.");
    let unsupported = failure.status == Some(501)
        || matches!(
            failure.error.as_str(),
            "MethodNotImplemented" | "XRPCNotSupported"
        )
        || failure.message.contains("Bad token scope")
        || (is_chat && failure.error == "InvalidToken");

    let status = failure
        .status
        .map_or_else(|| "no response".to_string(), |s| s.to_string());
    let detail = format!("{nsid} failed ({status}): {} {}", failure.error, failure.message)
        .trim_end()
        .to_string();
    if unsupported {
        SagemateError::Unsupported(detail)
    } else {
        SagemateError::Channel(detail)
    }
}

/// Closure for `map_err` on atrium calls.
pub(crate) fn xrpc_error<E>(nsid: &'static str) -> impl Fn(XrpcError<E>) -> SagemateError
where
    E: Debug,
    XrpcError<E>: Display,
{
    move |err| classify_error(nsid, &Failure::of(&err))
}

/// Parse a string into one of atrium's validated string types.
pub(crate) fn parse_param<T>(nsid: &str, field: &str, value: &str) -> Result<T, SagemateError>
where
    T: std::str::FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e| SagemateError::Channel(format!("{nsid}: invalid {field} {value:?}: {e}")))
}
