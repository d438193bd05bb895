//! One item, end to end: target, context, links, reply, delivery.

use super::composer::{Addressed, ReplyComposer, SafeReply};
use super::target;
use super::thread::{self, ThreadContext};
use sagemate_core::{
    error::SagemateError,
    message::{ChatMessage, Conversation},
    post::{Post, StrongRef},
    traits::SocialClient,
};
use sagemate_web::{harvest, harvest_parts, ContentExtractor};
use std::sync::Arc;
use tracing::{info, warn};

/// Limits applied to every item.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub post_char_limit: usize,
    pub dm_char_limit: usize,
    pub max_urls_per_item: usize,
    pub thread_depth: usize,
    pub dry_run: bool,
}

/// What happened to a composed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Posted(StrongRef),
    Sent,
    /// Dry-run: the reply was logged instead of delivered.
    Logged,
}

/// Shared by every item task of a run.
pub struct Pipeline {
    client: Arc<dyn SocialClient>,
    extractor: ContentExtractor,
    composer: ReplyComposer,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        client: Arc<dyn SocialClient>,
        extractor: ContentExtractor,
        composer: ReplyComposer,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            client,
            extractor,
            composer,
            settings,
        }
    }

    /// Answer a mention with a reply post.
    pub async fn answer_mention(&self, mention: &Post) -> Result<Delivery, SagemateError> {
        let client = self.client.as_ref();
        let target = target::resolve(client, mention).await;
        let context =
            thread::resolve(client, &target.post.uri, self.settings.thread_depth).await;

        // Notification and parent records carry unhydrated quotes; fetch the
        // post view so quoted posts contribute their links too.
        let hydrated = match client.get_post(&target.post.uri).await {
            Ok(post) => post,
            Err(e) => {
                warn!("pipeline: hydrated view of {} unavailable: {e}", target.post.uri);
                target.post.clone()
            }
        };
        let urls = harvest(&hydrated);
        let contents = self
            .extractor
            .fetch_all(&urls, self.settings.max_urls_per_item)
            .await;

        info!(
            "pipeline: mention {} from @{} | target {}{} | context {} | urls {} ({} with content)",
            mention.uri,
            mention.author.handle,
            target.post.uri,
            if target.redirected { " (parent)" } else { "" },
            context.len(),
            urls.len(),
            contents.len()
        );

        let limit = self.settings.post_char_limit;
        let reply = self
            .composer
            .compose(
                Addressed::Mention {
                    author: &target.post.author.handle,
                },
                &target.question,
                &context,
                &contents,
                limit,
            )
            .await
            .ok_or_else(|| no_reply(&mention.uri))?;

        let reply_ref = target.post.reply_ref_for_answer();
        if self.settings.dry_run {
            log_dry_run(&target.post.uri, &reply);
            return Ok(Delivery::Logged);
        }

        let posted = self
            .client
            .send_post(reply.as_str(), Some(&reply_ref))
            .await?;
        info!(
            "pipeline: replied to {} with {} ({} chars)",
            target.post.uri,
            posted.uri,
            reply.char_count()
        );
        Ok(Delivery::Posted(posted))
    }

    /// Answer `message`, the newest incoming message of `convo`, with `history`
    /// (newest first) as the conversation so far.
    pub async fn answer_dm(
        &self,
        convo: &Conversation,
        message: &ChatMessage,
        history: &[ChatMessage],
    ) -> Result<Delivery, SagemateError> {
        let context = ThreadContext::from_messages(
            history,
            convo,
            self.client.did(),
            self.client.handle(),
        );
        let urls = harvest_parts(&message.text, &message.facets, message.embed.as_ref());
        let contents = self
            .extractor
            .fetch_all(&urls, self.settings.max_urls_per_item)
            .await;
        let sender = convo.handle_of(&message.sender_did);

        info!(
            "pipeline: dm {} in {} from @{sender} | context {} | urls {} ({} with content)",
            message.id,
            convo.id,
            context.len(),
            urls.len(),
            contents.len()
        );

        let reply = self
            .composer
            .compose(
                Addressed::DirectMessage { author: &sender },
                &message.text,
                &context,
                &contents,
                self.settings.dm_char_limit,
            )
            .await
            .ok_or_else(|| no_reply(&message.id))?;

        if self.settings.dry_run {
            log_dry_run(&convo.id, &reply);
            return Ok(Delivery::Logged);
        }

        self.client.send_message(&convo.id, reply.as_str()).await?;
        info!(
            "pipeline: answered dm {} ({} chars)",
            message.id,
            reply.char_count()
        );
        Ok(Delivery::Sent)
    }
}

fn no_reply(item: &str) -> SagemateError {
    SagemateError::Provider(format!("no reply composed for {item}"))
}

fn log_dry_run(target: &str, reply: &SafeReply) {
    info!("[dry-run] would reply to {target}: {reply}");
}
