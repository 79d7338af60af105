//! Gateway over the backends of the `llm` crate.

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::{ChatMessage, ChatProvider, ChatResponse};
use llm::error::LLMError;
use llm::LLMProvider;
use tracing::{debug, warn};

use super::{ProviderGateway, TokenStream};
use crate::api::error::{AppError, ErrorCode};
use crate::api::model::{Message, Role};

/// Connection settings for one `llm` backend.
#[derive(Clone, Debug)]
pub struct LlmSettings {
    pub backend: LLMBackend,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Builds an `llm` provider per call so the conversation's system text can
/// be installed as the backend's system prompt.
pub struct LlmGateway {
    name: String,
    settings: LlmSettings,
}

impl LlmGateway {
    pub fn new(name: impl Into<String>, settings: LlmSettings) -> Self {
        Self {
            name: name.into(),
            settings,
        }
    }

    fn provider(&self, system: Option<String>) -> Result<Box<dyn LLMProvider>, AppError> {
        let s = &self.settings;
        let mut builder = LLMBuilder::new()
            .backend(s.backend.clone())
            .model(&s.model);

        if let Some(key) = &s.api_key {
            builder = builder.api_key(key);
        }
        if let Some(url) = &s.base_url {
            builder = builder.base_url(url);
        }
        if let Some(secs) = s.timeout_seconds {
            builder = builder.timeout_seconds(secs);
        }
        if let Some(t) = s.temperature {
            builder = builder.temperature(t);
        }
        if let Some(n) = s.max_tokens {
            builder = builder.max_tokens(n);
        }
        if let Some(system) = system {
            builder = builder.system(system);
        }

        builder
            .build()
            .map_err(|e| translate_llm_error(&self.name, e))
    }
}

/// Splits off system messages (joined by a blank line) and converts the
/// remaining turns to `llm` chat messages, preserving order.
fn to_chat(messages: &[Message]) -> (Option<String>, Vec<ChatMessage>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let chat = messages
        .iter()
        .filter_map(|m| match m.role {
            Role::System => None,
            Role::User => Some(ChatMessage::user().content(&m.content).build()),
            Role::Assistant => Some(ChatMessage::assistant().content(&m.content).build()),
        })
        .collect();
    let system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };
    (system, chat)
}

#[async_trait]
impl ProviderGateway for LlmGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, messages: &[Message]) -> Result<String, AppError> {
        let (system, chat) = to_chat(messages);
        let provider = self.provider(system)?;
        debug!(provider = %self.name, turns = chat.len(), "sending chat request");

        let response = provider.chat(&chat).await.map_err(|e| {
            let err = translate_llm_error(&self.name, e);
            warn!(provider = %self.name, code = %err.code, "chat request failed");
            err
        })?;
        Ok(response.text().unwrap_or_default())
    }

    fn stream(&self, messages: &[Message]) -> TokenStream {
        let (system, chat) = to_chat(messages);
        let provider = self.provider(system);
        let name = self.name.clone();

        Box::pin(stream! {
            let provider = match provider {
                Ok(p) => p,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            debug!(provider = %name, turns = chat.len(), "opening chat stream");

            let mut fragments = match provider.chat_stream(&chat).await {
                Ok(s) => s,
                Err(e) => {
                    yield Err(translate_llm_error(&name, e));
                    return;
                }
            };
            while let Some(fragment) = fragments.next().await {
                match fragment {
                    Ok(text) => yield Ok(text),
                    Err(e) => {
                        yield Err(translate_llm_error(&name, e));
                        return;
                    }
                }
            }
        })
    }
}

/// Maps an `llm` failure onto the shared taxonomy.
///
/// Details always carry `upstream` (provider name), `error` (raw
/// description) and `type` (the `llm` error variant).
pub fn translate_llm_error(upstream: &str, err: LLMError) -> AppError {
    let code = match &err {
        LLMError::AuthError(_) => ErrorCode::Unauthorized,
        LLMError::InvalidRequest(_) => ErrorCode::BadRequest,
        LLMError::HttpError(msg) | LLMError::ProviderError(msg) => classify_message(msg),
        _ => ErrorCode::UpstreamError,
    };
    AppError::new(code)
        .with_detail("upstream", upstream)
        .with_detail("error", err.to_string())
        .with_detail("type", error_kind(&err))
}

fn error_kind(err: &LLMError) -> &'static str {
    match err {
        LLMError::HttpError(_) => "HttpError",
        LLMError::AuthError(_) => "AuthError",
        LLMError::InvalidRequest(_) => "InvalidRequest",
        LLMError::ProviderError(_) => "ProviderError",
        LLMError::JsonError(_) => "JsonError",
        LLMError::Generic(_) => "Generic",
        _ => "LLMError",
    }
}

/// HTTP and provider errors only carry text; look for the status they
/// embed.
fn classify_message(msg: &str) -> ErrorCode {
    let lower = msg.to_ascii_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests")
    {
        ErrorCode::RateLimited
    } else if lower.contains("401") || lower.contains("unauthorized") || lower.contains("invalid api key")
    {
        ErrorCode::Unauthorized
    } else if lower.contains("bad request") {
        ErrorCode::BadRequest
    } else {
        ErrorCode::UpstreamError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_and_invalid_request_map_directly() {
        let err = translate_llm_error("openai", LLMError::AuthError("bad key".into()));
        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert_eq!(err.details["upstream"], "openai");
        assert_eq!(err.details["type"], "AuthError");

        let err = translate_llm_error("openai", LLMError::InvalidRequest("no model".into()));
        assert_eq!(err.code, ErrorCode::BadRequest);
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn http_errors_are_classified_by_status_text() {
        let err = translate_llm_error(
            "groq",
            LLMError::HttpError("HTTP 429 Too Many Requests".into()),
        );
        assert_eq!(err.code, ErrorCode::RateLimited);
        assert!(err.details["error"].as_str().unwrap().contains("429"));

        let err = translate_llm_error("groq", LLMError::ProviderError("401 Unauthorized".into()));
        assert_eq!(err.code, ErrorCode::Unauthorized);

        let err = translate_llm_error("groq", LLMError::HttpError("connection reset".into()));
        assert_eq!(err.code, ErrorCode::UpstreamError);
        assert_eq!(err.status(), 502);
    }

    #[test]
    fn unmapped_errors_fall_back_to_upstream() {
        let err = translate_llm_error("groq", LLMError::Generic("boom".into()));
        assert_eq!(err.code, ErrorCode::UpstreamError);
        assert_eq!(err.details["type"], "Generic");
    }

    #[test]
    fn system_messages_are_lifted_out_of_the_turns() {
        let (system, chat) = to_chat(&[
            Message::system("P"),
            Message::user("hi"),
            Message::assistant("hello"),
            Message::user("ok"),
        ]);
        assert_eq!(system.as_deref(), Some("P"));
        assert_eq!(chat.len(), 3);
        assert_eq!(chat[0].content, "hi");
        assert_eq!(chat[1].content, "hello");
    }

    #[test]
    fn no_system_message_means_no_system_prompt() {
        let (system, chat) = to_chat(&[Message::user("q")]);
        assert!(system.is_none());
        assert_eq!(chat.len(), 1);
    }
}
