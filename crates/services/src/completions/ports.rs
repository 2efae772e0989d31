use crate::chats::{ChatId, MessageId, Settings};
use crate::relay::RelayOutcome;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use inference_providers::{ChatCompletionParams, ChatMessage};
use std::pin::Pin;

#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;

/// Raw body of a `/stream-chat` response as it arrives from the proxy
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, CompletionError>> + Send>>;

// Error types
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// Malformed input, rejected before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// The proxy or provider failed; `details` is the error envelope or body
    #[error("Provider error (status {status:?}): {details}")]
    Provider {
        status: Option<u16>,
        details: serde_json::Value,
    },

    /// A single stream line was not valid JSON
    #[error("Malformed stream chunk: {0}")]
    Parse(String),

    #[error("Timed out waiting for the proxy")]
    Timeout,

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CompletionError::Timeout
        } else {
            CompletionError::Provider {
                status: e.status().map(|s| s.as_u16()),
                details: serde_json::Value::String(e.to_string()),
            }
        }
    }
}

/// Client side of the proxy wire protocol
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait ProxyClient: Send + Sync {
    /// `POST /chat`: the provider's JSON body, unmodified
    async fn chat(&self, request: &ChatCompletionParams) -> Result<serde_json::Value, CompletionError>;

    /// `POST /stream-chat`: the live event-stream body
    async fn stream_chat(&self, request: &ChatCompletionParams) -> Result<ByteStream, CompletionError>;
}

#[async_trait]
pub trait CompletionServiceTrait: Send + Sync {
    /// Single-shot completion; returns the provider's raw response body
    async fn create_chat_completion(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<serde_json::Value, CompletionError>;

    /// Streamed completion mirrored into `message_id`, tokens added to `chat_id`.
    /// Returns once the relay loop has finished.
    async fn create_stream_chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<RelayOutcome, CompletionError>;

    /// Minimal completion that only checks the provider credential is accepted
    async fn check_provider_key(&self) -> Result<serde_json::Value, CompletionError>;

    async fn get_settings(&self) -> Result<Option<Settings>, CompletionError>;
}
