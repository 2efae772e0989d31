//! Stream relay
//!
//! Reads the proxy's event-stream body line by line and mirrors the growing
//! completion into a [`MessageRepository`]. Every non-final write carries
//! [`IN_PROGRESS_MARKER`] so readers can tell the text is still arriving.
//! When the loop ends, however it ends, the token count of the accumulated
//! content is added to the chat once.

use crate::chats::{ChatId, ChatRepository, MessageId, MessageRepository};
use crate::completions::ports::CompletionError;
use crate::tokens::TokenCounter;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use inference_providers::{ChatCompletionChunk, LineBuffer, DONE_SENTINEL};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Appended to partial content while a stream is still running
pub const IN_PROGRESS_MARKER: char = '█';

const DATA_PREFIX: &str = "data: ";

/// What a finished relay loop produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Accumulated content, without the marker
    pub content: String,
    /// The `[DONE]` sentinel was seen and the message marked complete
    pub completed: bool,
    /// Tokens added to the chat total
    pub tokens: i64,
    /// `data:` lines that were not valid JSON
    pub skipped_lines: usize,
}

struct RelayState {
    message_id: MessageId,
    content: String,
    completed: bool,
    skipped_lines: usize,
}

pub struct StreamRelay {
    messages: Arc<dyn MessageRepository>,
    chats: Arc<dyn ChatRepository>,
    token_counter: Arc<dyn TokenCounter>,
    stream_timeout: Option<Duration>,
}

impl StreamRelay {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        chats: Arc<dyn ChatRepository>,
        token_counter: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            messages,
            chats,
            token_counter,
            stream_timeout: None,
        }
    }

    /// Bound the whole stream read; expiry ends the relay with `Timeout`
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = Some(timeout);
        self
    }

    /// Relay `body` into `message_id` and charge its tokens to `chat_id`.
    ///
    /// A transport error or timeout is returned only after the tokens of the
    /// content received so far have been added. Persistence failures abort
    /// immediately.
    pub async fn relay<S>(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        mut body: S,
    ) -> Result<RelayOutcome, CompletionError>
    where
        S: Stream<Item = Result<Bytes, CompletionError>> + Unpin + Send,
    {
        self.messages
            .begin_message(message_id)
            .await
            .map_err(persistence)?;

        let deadline = self.stream_timeout.map(|timeout| Instant::now() + timeout);
        let mut state = RelayState {
            message_id,
            content: String::new(),
            completed: false,
            skipped_lines: 0,
        };
        let mut lines = LineBuffer::new();
        let mut interruption = None;

        'read: loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, body.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(%chat_id, %message_id, "Stream deadline expired");
                        interruption = Some(CompletionError::Timeout);
                        break;
                    }
                },
                None => body.next().await,
            };

            match next {
                Some(Ok(bytes)) => {
                    lines.push(&bytes);
                    while let Some(line) = lines.next_line() {
                        if self.apply_line(&mut state, &line).await? {
                            break 'read;
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(%chat_id, %message_id, error = %e, "Stream interrupted");
                    interruption = Some(e);
                    break;
                }
                None => {
                    if let Some(line) = lines.finish() {
                        self.apply_line(&mut state, &line).await?;
                    }
                    if !state.completed {
                        warn!(%chat_id, %message_id, "Stream ended without [DONE]; message left pending");
                    }
                    break;
                }
            }
        }

        let tokens = self.add_tokens(chat_id, &state.content).await?;

        if let Some(e) = interruption {
            return Err(e);
        }

        info!(
            %chat_id,
            %message_id,
            tokens,
            completed = state.completed,
            skipped_lines = state.skipped_lines,
            "Stream relayed"
        );

        Ok(RelayOutcome {
            content: state.content,
            completed: state.completed,
            tokens,
            skipped_lines: state.skipped_lines,
        })
    }

    /// Returns `true` once the sentinel has been handled
    async fn apply_line(&self, state: &mut RelayState, line: &str) -> Result<bool, CompletionError> {
        let Some(data) = line.strip_prefix(DATA_PREFIX) else {
            return Ok(false);
        };

        if data == DONE_SENTINEL {
            self.write(state.message_id, &state.content, true).await?;
            state.completed = true;
            return Ok(true);
        }

        let json = match serde_json::from_str::<serde_json::Value>(data) {
            Ok(json) => json,
            Err(e) => {
                let err = CompletionError::Parse(e.to_string());
                warn!(message_id = %state.message_id, error = %err, "Skipping malformed stream line");
                state.skipped_lines += 1;
                return Ok(false);
            }
        };

        // Well-formed JSON that is not a chunk carries no content
        let chunk: ChatCompletionChunk = serde_json::from_value(json).unwrap_or_default();
        if let Some(delta) = chunk.delta_content() {
            state.content.push_str(delta);
            let partial = format!("{}{IN_PROGRESS_MARKER}", state.content);
            self.write(state.message_id, &partial, false).await?;
        }

        Ok(false)
    }

    async fn write(&self, id: MessageId, content: &str, complete: bool) -> Result<(), CompletionError> {
        let found = self
            .messages
            .update_content(id, content, complete)
            .await
            .map_err(persistence)?;
        if !found {
            warn!(message_id = %id, "Message disappeared during relay");
        }
        Ok(())
    }

    async fn add_tokens(&self, chat_id: ChatId, content: &str) -> Result<i64, CompletionError> {
        let tokens = self.token_counter.count(content) as i64;
        let found = self
            .chats
            .add_tokens(chat_id, tokens)
            .await
            .map_err(persistence)?;
        if found {
            debug!(%chat_id, tokens, "Chat token total updated");
        } else {
            warn!(%chat_id, tokens, "Chat not found; tokens not recorded");
        }
        Ok(tokens)
    }
}

fn persistence(e: anyhow::Error) -> CompletionError {
    CompletionError::Persistence(format!("{e:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chats::memory::InMemoryChatStore;
    use crate::tokens::BpeTokenCounter;
    use futures::stream;
    use serde_json::json;

    fn frame(delta: &str) -> String {
        let chunk = json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"content": delta}, "finish_reason": null}]
        });
        format!("data: {chunk}\n\n")
    }

    fn body(parts: Vec<String>) -> impl Stream<Item = Result<Bytes, CompletionError>> + Unpin + Send {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from(p))))
    }

    struct Fixture {
        store: Arc<InMemoryChatStore>,
        counter: Arc<BpeTokenCounter>,
        chat_id: ChatId,
        message_id: MessageId,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = Arc::new(InMemoryChatStore::new());
            let chat_id = ChatId::new();
            store.create_chat(chat_id).await.unwrap();
            Self {
                store,
                counter: Arc::new(BpeTokenCounter::r50k().unwrap()),
                chat_id,
                message_id: MessageId::new(),
            }
        }

        fn relay(&self) -> StreamRelay {
            StreamRelay::new(self.store.clone(), self.store.clone(), self.counter.clone())
        }

        async fn total_tokens(&self) -> i64 {
            self.store.get_chat(self.chat_id).await.unwrap().unwrap().total_tokens
        }
    }

    #[tokio::test]
    async fn test_hello_stream_writes_each_prefix() {
        let fx = Fixture::new().await;
        let parts = vec![frame("Hel"), frame("lo"), "data: [DONE]\n\n".to_string()];

        let outcome = fx
            .relay()
            .relay(fx.chat_id, fx.message_id, body(parts))
            .await
            .unwrap();

        assert_eq!(
            fx.store.content_writes(fx.message_id).await,
            vec!["Hel█", "Hello█", "Hello"]
        );
        let message = fx.store.get_message(fx.message_id).await.unwrap().unwrap();
        assert!(message.complete);
        assert_eq!(message.content, "Hello");
        assert_eq!(outcome.tokens, fx.counter.count("Hello") as i64);
        assert_eq!(fx.total_tokens().await, outcome.tokens);
    }

    #[tokio::test]
    async fn test_malformed_line_is_skipped() {
        let fx = Fixture::new().await;
        let parts = vec![
            frame("h"),
            "data: {not json\n\n".to_string(),
            frame("i"),
            "data: [DONE]\n\n".to_string(),
        ];

        let outcome = fx
            .relay()
            .relay(fx.chat_id, fx.message_id, body(parts))
            .await
            .unwrap();

        assert_eq!(outcome.content, "hi");
        assert_eq!(outcome.skipped_lines, 1);
        assert!(outcome.completed);
        let message = fx.store.get_message(fx.message_id).await.unwrap().unwrap();
        assert_eq!(message.content, "hi");
    }

    #[tokio::test]
    async fn test_lines_split_across_reads() {
        let fx = Fixture::new().await;
        let whole = format!("{}{}data: [DONE]\n\n", frame("héllo"), frame(" wörld"));
        let bytes = whole.into_bytes();
        // Split inside the multi-byte 'é'
        let split = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let parts = vec![bytes[..split].to_vec(), bytes[split..].to_vec()];
        let body = stream::iter(parts.into_iter().map(|p| Ok(Bytes::from(p))));

        let outcome = fx.relay().relay(fx.chat_id, fx.message_id, body).await.unwrap();

        assert_eq!(outcome.content, "héllo wörld");
        assert!(outcome.completed);
    }

    #[tokio::test]
    async fn test_ignores_non_data_and_contentless_lines() {
        let fx = Fixture::new().await;
        let parts = vec![
            ": keep-alive\n".to_string(),
            "event: message\n".to_string(),
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n".to_string(),
            "data: {\"unexpected\":true}\n\n".to_string(),
            frame("ok"),
            "data: [DONE]\n\n".to_string(),
        ];

        let outcome = fx
            .relay()
            .relay(fx.chat_id, fx.message_id, body(parts))
            .await
            .unwrap();

        assert_eq!(fx.store.content_writes(fx.message_id).await, vec!["ok█", "ok"]);
        assert_eq!(outcome.skipped_lines, 0);
    }

    #[tokio::test]
    async fn test_stream_without_sentinel_stays_pending() {
        let fx = Fixture::new().await;
        let parts = vec![frame("a"), frame("b")];

        let outcome = fx
            .relay()
            .relay(fx.chat_id, fx.message_id, body(parts))
            .await
            .unwrap();

        assert!(!outcome.completed);
        let message = fx.store.get_message(fx.message_id).await.unwrap().unwrap();
        assert_eq!(message.content, "ab█");
        assert!(!message.complete);
        assert_eq!(fx.total_tokens().await, fx.counter.count("ab") as i64);
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline_is_processed() {
        let fx = Fixture::new().await;
        let parts = vec![frame("x"), "data: [DONE]".to_string()];

        let outcome = fx
            .relay()
            .relay(fx.chat_id, fx.message_id, body(parts))
            .await
            .unwrap();

        assert!(outcome.completed);
    }

    #[tokio::test]
    async fn test_transport_error_still_counts_tokens() {
        let fx = Fixture::new().await;
        let items = vec![
            Ok(Bytes::from(frame("partial"))),
            Err(CompletionError::Provider {
                status: None,
                details: json!("connection reset"),
            }),
        ];

        let result = fx
            .relay()
            .relay(fx.chat_id, fx.message_id, stream::iter(items))
            .await;

        assert!(matches!(result, Err(CompletionError::Provider { .. })));
        assert_eq!(fx.total_tokens().await, fx.counter.count("partial") as i64);
    }

    #[tokio::test]
    async fn test_stream_timeout_counts_tokens_then_fails() {
        let fx = Fixture::new().await;
        let body = body(vec![frame("slow")]).chain(stream::pending());

        let result = fx
            .relay()
            .with_stream_timeout(Duration::from_millis(50))
            .relay(fx.chat_id, fx.message_id, body)
            .await;

        assert!(matches!(result, Err(CompletionError::Timeout)));
        let message = fx.store.get_message(fx.message_id).await.unwrap().unwrap();
        assert_eq!(message.content, "slow█");
        assert!(!message.complete);
        assert_eq!(fx.total_tokens().await, fx.counter.count("slow") as i64);
    }

    #[tokio::test]
    async fn test_reprocessing_same_stream_gives_same_message() {
        let fx = Fixture::new().await;
        let parts = || vec![frame("same"), frame(" text"), "data: [DONE]\n\n".to_string()];

        fx.relay()
            .relay(fx.chat_id, fx.message_id, body(parts()))
            .await
            .unwrap();
        let first = fx.store.get_message(fx.message_id).await.unwrap();
        fx.relay()
            .relay(fx.chat_id, fx.message_id, body(parts()))
            .await
            .unwrap();
        let second = fx.store.get_message(fx.message_id).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_relays_add_up() {
        let fx = Fixture::new().await;
        let relay = Arc::new(fx.relay());
        let texts = ["one two", "three four five", "six"];

        let tasks: Vec<_> = texts
            .iter()
            .map(|text| {
                let relay = relay.clone();
                let chat_id = fx.chat_id;
                let parts = vec![frame(text), "data: [DONE]\n\n".to_string()];
                tokio::spawn(async move {
                    relay.relay(chat_id, MessageId::new(), body(parts)).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let expected: i64 = texts.iter().map(|t| fx.counter.count(t) as i64).sum();
        assert_eq!(fx.total_tokens().await, expected);
    }

    #[tokio::test]
    async fn test_missing_chat_is_not_an_error() {
        let fx = Fixture::new().await;
        let parts = vec![frame("orphan"), "data: [DONE]\n\n".to_string()];

        let outcome = fx
            .relay()
            .relay(ChatId::new(), fx.message_id, body(parts))
            .await
            .unwrap();

        assert!(outcome.completed);
        assert_eq!(fx.total_tokens().await, 0);
    }
}
