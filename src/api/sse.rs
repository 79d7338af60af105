//! Server-sent event framing of a provider token stream.
//!
//! The encoder buffers fragments and flushes a `token` event once the
//! buffer reaches the flush threshold or a fragment carries a newline. The
//! stream always ends with exactly one terminal event, `done` or `error`.

use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

use super::error::{AppError, ErrorCode};
use super::provider::TokenStream;

/// Default buffered character count that triggers a flush.
pub const DEFAULT_FLUSH_CHARS: usize = 64;

#[derive(Clone, Debug, PartialEq)]
pub enum SseEvent {
    Token(String),
    Done,
    /// `{code, message, details}` body.
    Error(Value),
}

impl SseEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SseEvent::Token(_) => "token",
            SseEvent::Done => "done",
            SseEvent::Error(_) => "error",
        }
    }

    pub fn data(&self) -> String {
        match self {
            SseEvent::Token(text) => text.clone(),
            SseEvent::Done => "done".to_string(),
            SseEvent::Error(body) => body.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SseEvent::Token(_))
    }

    /// `event: <name>\ndata: <data>\n\n`
    pub fn to_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.name(), self.data())
    }
}

/// Encoder lifecycle. `Done` and `Errored` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EncoderState {
    Streaming,
    Flushing,
    Done,
    Errored,
}

/// Flush policy for [`StreamEncoder::encode`].
#[derive(Clone, Copy, Debug)]
pub struct StreamEncoder {
    pub flush_chars: usize,
    pub flush_on_newline: bool,
}

impl Default for StreamEncoder {
    fn default() -> Self {
        Self {
            flush_chars: DEFAULT_FLUSH_CHARS,
            flush_on_newline: true,
        }
    }
}

impl StreamEncoder {
    pub fn new(flush_chars: usize, flush_on_newline: bool) -> Self {
        Self {
            flush_chars,
            flush_on_newline,
        }
    }

    /// Wraps `tokens` into an event stream.
    ///
    /// The source is pulled only when the returned stream is polled, one
    /// fragment at a time. Dropping the returned stream drops the source.
    pub fn encode(self, tokens: TokenStream) -> BoxStream<'static, SseEvent> {
        let run = Run {
            source: tokens,
            policy: self,
            buf: String::new(),
            buf_chars: 0,
            state: EncoderState::Streaming,
            pending: None,
        };
        stream::unfold(run, |mut run| async move {
            let event = run.next_event().await?;
            Some((event, run))
        })
        .boxed()
    }
}

struct Run {
    source: TokenStream,
    policy: StreamEncoder,
    buf: String,
    buf_chars: usize,
    state: EncoderState,
    /// Terminal event queued behind a final flush.
    pending: Option<SseEvent>,
}

impl Run {
    async fn next_event(&mut self) -> Option<SseEvent> {
        if let Some(event) = self.pending.take() {
            return Some(event);
        }
        loop {
            match self.state {
                EncoderState::Done | EncoderState::Errored => return None,
                EncoderState::Flushing => {
                    self.state = EncoderState::Done;
                    debug!("stream finished");
                    return Some(self.finish(SseEvent::Done));
                }
                EncoderState::Streaming => {
                    // A panicking source is an unexpected failure, not a crash.
                    let next = AssertUnwindSafe(self.source.next()).catch_unwind().await;
                    match next {
                        Ok(None) => self.state = EncoderState::Flushing,
                        Ok(Some(Ok(fragment))) => {
                            if fragment.is_empty() {
                                continue;
                            }
                            let newline = self.policy.flush_on_newline && fragment.contains('\n');
                            self.buf_chars += fragment.chars().count();
                            self.buf.push_str(&fragment);
                            if self.buf_chars >= self.policy.flush_chars || newline {
                                if let Some(text) = self.take() {
                                    return Some(SseEvent::Token(text));
                                }
                            }
                        }
                        Ok(Some(Err(err))) => {
                            warn!(code = %err.code, "stream failed upstream");
                            self.state = EncoderState::Errored;
                            return Some(self.finish(SseEvent::Error(err.body())));
                        }
                        Err(panic) => {
                            warn!("stream source panicked");
                            self.state = EncoderState::Errored;
                            return Some(self.finish(SseEvent::Error(unexpected_failure(panic))));
                        }
                    }
                }
            }
        }
    }

    fn take(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        self.buf_chars = 0;
        Some(std::mem::take(&mut self.buf))
    }

    /// Emits buffered text ahead of the terminal event.
    fn finish(&mut self, terminal: SseEvent) -> SseEvent {
        match self.take() {
            Some(text) => {
                self.pending = Some(terminal);
                SseEvent::Token(text)
            }
            None => terminal,
        }
    }
}

fn unexpected_failure(panic: Box<dyn Any + Send>) -> Value {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_default();
    AppError::new(ErrorCode::InternalError)
        .with_detail("type", "panic")
        .with_detail("error", message)
        .body()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::Poll;

    fn source(items: Vec<Result<&str, AppError>>) -> TokenStream {
        Box::pin(stream::iter(
            items
                .into_iter()
                .map(|r| r.map(str::to_string))
                .collect::<Vec<_>>(),
        ))
    }

    async fn run(items: Vec<Result<&str, AppError>>) -> Vec<SseEvent> {
        StreamEncoder::default().encode(source(items)).collect().await
    }

    #[tokio::test]
    async fn long_fragment_is_one_token_then_done() {
        let long = "a".repeat(70);
        let events = run(vec![Ok(long.as_str())]).await;
        assert_eq!(events, vec![SseEvent::Token(long.clone()), SseEvent::Done]);
    }

    #[tokio::test]
    async fn short_fragments_accumulate_until_the_end() {
        let events = run(vec![Ok("a"), Ok("b"), Ok("c")]).await;
        assert_eq!(events, vec![SseEvent::Token("abc".into()), SseEvent::Done]);
    }

    #[tokio::test]
    async fn threshold_is_measured_across_fragments() {
        let part = "x".repeat(30);
        let events = run(vec![Ok(part.as_str()), Ok(part.as_str()), Ok(part.as_str())]).await;
        assert_eq!(events, vec![SseEvent::Token("x".repeat(90)), SseEvent::Done]);
    }

    #[tokio::test]
    async fn threshold_counts_characters_not_bytes() {
        let wide = "é".repeat(40);
        let events = run(vec![Ok(wide.as_str()), Ok(wide.as_str())]).await;
        assert_eq!(events, vec![SseEvent::Token("é".repeat(80)), SseEvent::Done]);
    }

    #[tokio::test]
    async fn newline_forces_a_flush() {
        let events = run(vec![Ok("ab\n"), Ok("cd")]).await;
        assert_eq!(
            events,
            vec![
                SseEvent::Token("ab\n".into()),
                SseEvent::Token("cd".into()),
                SseEvent::Done
            ]
        );
    }

    #[tokio::test]
    async fn newline_flush_can_be_disabled() {
        let events = StreamEncoder::new(64, false)
            .encode(source(vec![Ok("ab\n"), Ok("cd")]))
            .collect::<Vec<_>>()
            .await;
        assert_eq!(events, vec![SseEvent::Token("ab\ncd".into()), SseEvent::Done]);
    }

    #[tokio::test]
    async fn empty_fragments_are_skipped() {
        assert_eq!(run(vec![]).await, vec![SseEvent::Done]);
        assert_eq!(run(vec![Ok(""), Ok("")]).await, vec![SseEvent::Done]);
    }

    #[tokio::test]
    async fn taxonomy_error_ends_the_stream_without_done() {
        let limited = AppError::new(ErrorCode::RateLimited).with_detail("upstream", "groq");
        let events = run(vec![Ok("a"), Ok("b"), Err(limited), Ok("never")]).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], SseEvent::Token("ab".into()));
        let SseEvent::Error(body) = &events[1] else {
            panic!("expected error event, got {:?}", events[1]);
        };
        assert_eq!(body["code"], "RATE_LIMITED");
        assert_eq!(body["details"]["upstream"], "groq");
        assert!(!events.contains(&SseEvent::Done));
    }

    #[tokio::test]
    async fn error_without_buffered_text_is_the_only_event() {
        let events = run(vec![Err(AppError::new(ErrorCode::Unauthorized))]).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], SseEvent::Error(body) if body["code"] == "UNAUTHORIZED"));
    }

    #[tokio::test]
    async fn panicking_source_becomes_internal_error() {
        let tokens: TokenStream = Box::pin(
            stream::iter(vec![Ok("line\n".to_string())]).chain(stream::poll_fn(
                |_| -> Poll<Option<Result<String, AppError>>> { panic!("boom") },
            )),
        );
        let events: Vec<SseEvent> = StreamEncoder::default().encode(tokens).collect().await;

        assert_eq!(events[0], SseEvent::Token("line\n".into()));
        let SseEvent::Error(body) = &events[1] else {
            panic!("expected error event");
        };
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert_eq!(body["details"]["type"], "panic");
        assert_eq!(body["details"]["error"], "boom");
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn exactly_one_terminal_event_and_it_is_last() {
        let events = run(vec![Ok("a\n"), Ok("b"), Ok("c\n"), Ok("d")]).await;
        let terminals = events.iter().filter(|e| e.is_terminal()).count();
        assert_eq!(terminals, 1);
        assert!(events.last().unwrap().is_terminal());
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn dropping_the_events_stops_pulling_and_releases_the_source() {
        let released = Arc::new(AtomicBool::new(false));
        let pulls = Arc::new(AtomicUsize::new(0));
        let guard = DropFlag(released.clone());
        let counter = pulls.clone();
        let tokens: TokenStream = Box::pin(
            stream::iter(vec!["x\n", "y\n", "z\n"])
                .inspect(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .map(move |t| {
                    let _alive = &guard;
                    Ok::<_, AppError>(t.to_string())
                }),
        );

        let mut events = StreamEncoder::default().encode(tokens);
        assert_eq!(events.next().await, Some(SseEvent::Token("x\n".into())));
        assert!(!released.load(Ordering::SeqCst));

        drop(events);
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(pulls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn frames_follow_the_event_stream_format() {
        assert_eq!(
            SseEvent::Token("hi".into()).to_frame(),
            "event: token\ndata: hi\n\n"
        );
        assert_eq!(SseEvent::Done.to_frame(), "event: done\ndata: done\n\n");
        let frame = SseEvent::Error(AppError::new(ErrorCode::UpstreamError).body()).to_frame();
        assert!(frame.starts_with("event: error\ndata: {"));
        let json: Value = serde_json::from_str(
            frame
                .trim_start_matches("event: error\ndata: ")
                .trim_end(),
        )
        .unwrap();
        assert_eq!(json["code"], "UPSTREAM_ERROR");
    }
}
