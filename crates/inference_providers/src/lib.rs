//! Inference providers crate: the outbound side of the chat relay
//!
//! This crate knows how to talk to an OpenAI-compatible chat completions API
//! and nothing about persistence. A provider is anything that can take
//! `{model, messages, stream}` and answer with either one JSON completion or
//! an asynchronous sequence of completion chunks.
//!
//! # Usage
//!
//! ```rust,ignore
//! use inference_providers::{ChatCompletionParams, ChatMessage, InferenceProvider};
//! use futures_util::StreamExt;
//!
//! async fn example<P: InferenceProvider>(provider: P) {
//!     let params = ChatCompletionParams {
//!         model: "gpt-4".to_string(),
//!         messages: vec![ChatMessage::user("hello")],
//!         stream: Some(true),
//!     };
//!
//!     let mut stream = provider.chat_completion_stream(params).await?;
//!     while let Some(event) = stream.next().await {
//!         match event {
//!             Ok(event) => println!("Delta content: {:?}", event.chunk.delta_content()),
//!             Err(e) => eprintln!("Stream error: {}", e),
//!         }
//!     }
//! }
//! ```

pub mod mock;
pub mod models;
pub mod openai_compatible;
pub mod sse_parser;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

// Re-export commonly used types for convenience
pub use mock::MockProvider;
pub use models::{
    ChatChoice, ChatCompletionChunk, ChatCompletionParams, ChatCompletionResponse,
    ChatCompletionResponseChoice, ChatCompletionResponseWithBytes, ChatDelta, ChatMessage,
    ChatResponseMessage, CompletionError, MessageRole, TokenUsage,
};
pub use openai_compatible::{OpenAiCompatibleConfig, OpenAiCompatibleProvider};
pub use sse_parser::{LineBuffer, SSEEvent, SSEParser, DONE_SENTINEL};

/// Type alias for streaming completion results
///
/// Each item is one provider event: the raw JSON payload plus its parsed
/// chunk, or the error that interrupted the stream.
pub type StreamingResult = Pin<Box<dyn Stream<Item = Result<SSEEvent, CompletionError>> + Send>>;

#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Performs a single-shot chat completion request
    async fn chat_completion(
        &self,
        params: ChatCompletionParams,
    ) -> Result<ChatCompletionResponseWithBytes, CompletionError>;

    /// Performs a streaming chat completion request
    ///
    /// Errors that happen before the provider starts answering are returned
    /// directly; later failures arrive as `Err` items on the stream.
    async fn chat_completion_stream(
        &self,
        params: ChatCompletionParams,
    ) -> Result<StreamingResult, CompletionError>;
}
