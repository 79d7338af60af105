pub mod api;
pub mod cli;
pub mod commands;
pub mod core;

pub use api::{
    AppError, ChatReply, ChatRunner, ChatStream, ErrorCode, PromptRelay, PromptResolver, SseEvent,
    StoreError, StreamEncoder,
};
