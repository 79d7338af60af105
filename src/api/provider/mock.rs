use async_trait::async_trait;
use futures::stream;

use super::{ProviderGateway, TokenStream};
use crate::api::error::AppError;
use crate::api::model::{Message, Role};

/// Offline backend.
///
/// `echo` replies `echo: <last user message>`, streamed word by word.
/// `scripted` replays a fixed fragment sequence, errors included.
#[derive(Clone, Debug)]
pub struct MockGateway {
    script: Option<Vec<Result<String, AppError>>>,
}

impl MockGateway {
    pub fn echo() -> Self {
        Self { script: None }
    }

    pub fn scripted(script: Vec<Result<String, AppError>>) -> Self {
        Self {
            script: Some(script),
        }
    }

    fn fragments(&self, messages: &[Message]) -> Vec<Result<String, AppError>> {
        match &self.script {
            Some(script) => script.clone(),
            None => echo_reply(messages)
                .split_inclusive(' ')
                .map(|w| Ok(w.to_string()))
                .collect(),
        }
    }
}

fn echo_reply(messages: &[Message]) -> String {
    let last = messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or_default();
    format!("echo: {}", last)
}

#[async_trait]
impl ProviderGateway for MockGateway {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, messages: &[Message]) -> Result<String, AppError> {
        self.fragments(messages).into_iter().collect()
    }

    fn stream(&self, messages: &[Message]) -> TokenStream {
        Box::pin(stream::iter(self.fragments(messages)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use futures::StreamExt;

    #[tokio::test]
    async fn echo_replies_to_the_last_user_message() {
        let gw = MockGateway::echo();
        let reply = gw
            .send(&[Message::system("P"), Message::user("first"), Message::user("ok")])
            .await
            .unwrap();
        assert_eq!(reply, "echo: ok");
    }

    #[tokio::test]
    async fn echo_stream_concatenates_to_the_reply() {
        let gw = MockGateway::echo();
        let parts: Vec<String> = gw
            .stream(&[Message::user("one two three")])
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(parts.len(), 4);
        assert_eq!(parts.concat(), "echo: one two three");
    }

    #[tokio::test]
    async fn scripted_send_stops_at_the_first_error() {
        let gw = MockGateway::scripted(vec![
            Ok("a".into()),
            Err(AppError::new(ErrorCode::RateLimited)),
            Ok("b".into()),
        ]);
        let err = gw.send(&[Message::user("x")]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RateLimited);
    }
}
