//! Language-model backends behind one capability set.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use super::error::AppError;
use super::model::Message;

mod llm_backend;
mod mock;

pub use llm_backend::{translate_llm_error, LlmGateway, LlmSettings};
pub use mock::MockGateway;

/// Lazy sequence of reply fragments. Dropping it releases the upstream
/// connection.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, AppError>> + Send>>;

/// A chat backend.
///
/// Every failure leaves the gateway as an [`AppError`] whose details name
/// the upstream provider; backend error types never escape.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    fn name(&self) -> &str;

    /// Sends the conversation and waits for the whole reply.
    async fn send(&self, messages: &[Message]) -> Result<String, AppError>;

    /// Opens a streaming reply. Nothing is sent upstream until the stream is
    /// first polled; connection failures arrive as the first item.
    fn stream(&self, messages: &[Message]) -> TokenStream;
}
