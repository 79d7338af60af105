//! Fluent runner for a single chat request.

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

use super::assembler::{Assembled, ChatInput, MessageAssembler};
use super::error::AppError;
use super::provider::TokenStream;
use super::relay::PromptRelay;
use super::sse::SseEvent;

/// Reply of a single-shot chat.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub reply: String,
    pub provider: String,
    pub tag: Option<String>,
    pub version: Option<u32>,
}

/// A streaming chat whose framing has begun. Failures from here on arrive
/// as the terminal `error` event.
pub struct ChatStream {
    pub provider: String,
    pub tag: Option<String>,
    pub version: Option<u32>,
    pub events: BoxStream<'static, SseEvent>,
}

impl ChatStream {
    /// The events rendered as wire frames.
    pub fn frames(self) -> BoxStream<'static, String> {
        self.events.map(|event| event.to_frame()).boxed()
    }
}

/// A fluent builder to configure and execute one chat.
pub struct ChatRunner<'a> {
    relay: &'a PromptRelay,
    input: ChatInput,
}

impl<'a> ChatRunner<'a> {
    pub(crate) fn new(relay: &'a PromptRelay, prompt: String) -> Self {
        Self {
            relay,
            input: ChatInput {
                prompt,
                ..Default::default()
            },
        }
    }

    /// Uses the stored prompt definition with this tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.input.tag = Some(tag.into());
        self
    }

    /// Definition version; 1 when a tag is set without one.
    pub fn version(mut self, version: u32) -> Self {
        self.input.version = Some(version);
        self
    }

    /// Overrides the system text. An empty override is ignored.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.input.system = Some(system.into());
        self
    }

    /// Sets the variables for `{key}` substitution in the prompt.
    pub fn vars(
        mut self,
        vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        self.input.vars = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Resolves and assembles the conversation without calling the provider.
    pub async fn messages(&self) -> Result<Assembled, AppError> {
        MessageAssembler::new(&self.relay.resolver)
            .build(&self.input)
            .await
    }

    /// Sends the conversation and waits for the reply.
    pub async fn send(self) -> Result<ChatReply, AppError> {
        let assembled = self.messages().await?;
        let gateway = &self.relay.gateway;
        debug!(
            provider = gateway.name(),
            messages = assembled.messages.len(),
            "relaying chat"
        );
        let reply = gateway.send(&assembled.messages).await?;
        Ok(ChatReply {
            reply,
            provider: gateway.name().to_string(),
            tag: assembled.tag,
            version: assembled.version,
        })
    }

    /// Resolves the prompt, then opens an event stream over the provider's
    /// reply.
    ///
    /// Resolution failures are returned as `Err` since nothing has been
    /// framed yet; provider failures become the stream's `error` event.
    pub async fn stream(self) -> Result<ChatStream, AppError> {
        let assembled = self.messages().await?;
        let gateway = &self.relay.gateway;
        debug!(
            provider = gateway.name(),
            messages = assembled.messages.len(),
            "relaying chat stream"
        );
        let tokens: TokenStream = gateway.stream(&assembled.messages);
        Ok(ChatStream {
            provider: gateway.name().to_string(),
            tag: assembled.tag,
            version: assembled.version,
            events: self.relay.encoder.encode(tokens),
        })
    }
}
