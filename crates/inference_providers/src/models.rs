use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One turn of a conversation. Order within a request is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Parameters for chat completion requests (OpenAI wire shape)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionParams {
    /// Model ID to use for the completion
    pub model: String,

    /// List of messages comprising the conversation so far
    pub messages: Vec<ChatMessage>,

    /// Whether to stream back partial progress
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Delta message in streaming chat completions
/// All fields are optional as they may not be present in every chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Choice in a chat completion chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatChoice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,

    /// Incremental message delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<ChatDelta>,

    /// Reason why generation finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
    pub total_tokens: i32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: i32, completion_tokens: i32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Chat completion streaming chunk
///
/// Every field is optional: providers differ in what they send, and a chunk
/// missing the fields a consumer looks for is a no-op rather than an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default)]
    pub choices: Vec<ChatChoice>,

    /// Usage statistics (typically only in final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl ChatCompletionChunk {
    /// Content delta of the first choice, if present and non-empty
    pub fn delta_content(&self) -> Option<&str> {
        self.choices
            .first()?
            .delta
            .as_ref()?
            .content
            .as_deref()
            .filter(|content| !content.is_empty())
    }
}

/// Message in a complete chat completion response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionResponseChoice {
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub message: Option<ChatResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Complete (non-streaming) chat completion response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatCompletionResponseChoice>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

/// Wrapper for chat completion response that includes raw bytes from provider
///
/// The proxy hands `raw_bytes` back to its caller unmodified; `response` is
/// the parsed view used for logging.
#[derive(Debug, Clone)]
pub struct ChatCompletionResponseWithBytes {
    pub response: ChatCompletionResponse,
    pub raw_bytes: Vec<u8>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// Transport-level failure (connection refused, reset, body read error)
    #[error("Failed to perform completion: {0}")]
    CompletionError(String),

    /// The provider answered with a non-success status; `message` is the raw body
    #[error("Provider returned HTTP {status_code}: {message}")]
    HttpError { status_code: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Request to provider timed out")]
    Timeout,
}

impl CompletionError {
    /// Upstream HTTP status, when the provider supplied one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpError { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CompletionError::Timeout
        } else {
            CompletionError::CompletionError(e.to_string())
        }
    }
}
