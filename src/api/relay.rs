//! The main entry point for relaying chats through stored prompts.

use std::sync::Arc;

use super::provider::ProviderGateway;
use super::resolver::PromptResolver;
use super::runner::ChatRunner;
use super::sse::StreamEncoder;

/// Ties a resolver, a provider gateway and a stream encoder together.
///
/// Build one per process and share it; every chat call is independent.
pub struct PromptRelay {
    pub(crate) resolver: PromptResolver,
    pub(crate) gateway: Arc<dyn ProviderGateway>,
    pub(crate) encoder: StreamEncoder,
}

impl PromptRelay {
    pub fn new(resolver: PromptResolver, gateway: Arc<dyn ProviderGateway>) -> Self {
        Self {
            resolver,
            gateway,
            encoder: StreamEncoder::default(),
        }
    }

    /// Replaces the default flush policy used by streaming chats.
    pub fn with_encoder(mut self, encoder: StreamEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Prompt definitions and few-shots: resolution and writes.
    pub fn prompts(&self) -> &PromptResolver {
        &self.resolver
    }

    pub fn provider_name(&self) -> &str {
        self.gateway.name()
    }

    /// Starts a chat request for `prompt`.
    ///
    /// # Arguments
    ///
    /// * `prompt` - The caller's text. With a template tag, `{key}`
    ///   placeholders in it are filled from `vars`.
    pub fn chat(&self, prompt: impl Into<String>) -> ChatRunner<'_> {
        ChatRunner::new(self, prompt.into())
    }
}
