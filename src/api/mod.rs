//! Prompt resolution, message assembly and reply relaying.

mod assembler;
mod cache;
mod error;
mod file_store;
mod model;
mod provider;
mod relay;
mod resolver;
mod runner;
mod sse;
mod store;

pub use assembler::{compose, render_vars, Assembled, ChatInput, MessageAssembler};
pub use cache::{cache_key, MemoryCache, PromptCache};
pub use error::{AppError, ErrorCode, StoreError};
pub use file_store::FileStore;
pub use model::{
    DefinitionDraft, FewShotDraft, FewShotExample, Message, PromptDefinition, ResolvedPrompt,
    Role, Upserted,
};
pub use provider::{
    translate_llm_error, LlmGateway, LlmSettings, MockGateway, ProviderGateway, TokenStream,
};
pub use relay::PromptRelay;
pub use resolver::{PromptResolver, DEFAULT_CACHE_TTL};
pub use runner::{ChatReply, ChatRunner, ChatStream};
pub use sse::{SseEvent, StreamEncoder, DEFAULT_FLUSH_CHARS};
pub use store::{MemoryStore, PromptStore};
