use crate::{
    error::SagemateError,
    message::{ChatMessage, Conversation, Notification, Profile},
    post::{Post, ReplyRef, StrongRef, ThreadNode},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A single-shot completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System-level directive.
    pub system: String,
    /// The user prompt.
    pub prompt: String,
    pub max_tokens: u32,
}

/// What the provider answered, with usage metadata.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    /// Token count (if available from the provider).
    pub tokens_used: Option<u64>,
    /// Wall-clock processing time in milliseconds.
    pub processing_time_ms: u64,
    pub model: Option<String>,
}

/// AI Provider trait: the language model.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Run one completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, SagemateError>;

    /// Verify the provider is reachable and the credentials work.
    async fn health_check(&self) -> Result<(), SagemateError> {
        let request = CompletionRequest {
            system: String::new(),
            prompt: "Reply with OK.".to_string(),
            max_tokens: 5,
        };
        self.complete(&request).await.map(|_| ())
    }
}

/// Social network client: the account the bot speaks through.
///
/// Direct-message calls may fail with [`SagemateError::Unsupported`] when the
/// credentials have no access to the chat service.
#[async_trait]
pub trait SocialClient: Send + Sync {
    /// Handle of the logged-in account.
    fn handle(&self) -> &str;

    /// DID of the logged-in account.
    fn did(&self) -> &str;

    async fn get_profile(&self, actor: &str) -> Result<Profile, SagemateError>;

    /// Most recent notifications, newest first.
    async fn list_notifications(&self, limit: u32) -> Result<Vec<Notification>, SagemateError>;

    /// Thread view rooted at `uri`, including up to `parent_height` ancestors.
    async fn get_thread(&self, uri: &str, parent_height: u32)
        -> Result<ThreadNode, SagemateError>;

    /// A single post with embeds hydrated.
    async fn get_post(&self, uri: &str) -> Result<Post, SagemateError>;

    /// Publish a post, optionally as a reply.
    async fn send_post(
        &self,
        text: &str,
        reply: Option<&ReplyRef>,
    ) -> Result<StrongRef, SagemateError>;

    /// Mark every notification indexed up to `seen_at` as read.
    async fn mark_notifications_seen(&self, seen_at: DateTime<Utc>) -> Result<(), SagemateError>;

    async fn list_conversations(&self) -> Result<Vec<Conversation>, SagemateError>;

    /// Most recent messages of a conversation, newest first.
    async fn get_messages(
        &self,
        convo_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, SagemateError>;

    async fn send_message(&self, convo_id: &str, text: &str) -> Result<(), SagemateError>;

    async fn mark_conversation_read(&self, convo_id: &str) -> Result<(), SagemateError>;
}

/// Raw page download.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Download `url` and return the decoded body.
    ///
    /// Non-success statuses and non-textual content are errors.
    async fn get(&self, url: &str) -> Result<String, SagemateError>;
}
