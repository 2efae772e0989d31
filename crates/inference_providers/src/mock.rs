//! Mock implementation of InferenceProvider for testing
//!
//! Generates OpenAI-shaped responses without any network access and records
//! every request it receives so tests can assert on what reached the
//! provider boundary.

use crate::{
    ChatChoice, ChatCompletionChunk, ChatCompletionParams, ChatCompletionResponse,
    ChatCompletionResponseChoice, ChatCompletionResponseWithBytes, ChatDelta, ChatResponseMessage,
    CompletionError, InferenceProvider, SSEEvent, StreamingResult, TokenUsage,
};
use async_trait::async_trait;
use futures_util::stream;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Template for generating responses
#[derive(Clone, Debug)]
pub struct ResponseTemplate {
    chunks: Vec<String>,
    /// Stream ends cleanly after N chunks
    disconnect_after_chunks: Option<usize>,
    /// Stream yields a transport error after N chunks
    fail_after_chunks: Option<usize>,
}

impl ResponseTemplate {
    /// Content streamed word by word (split by spaces)
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let chunks: Vec<String> = content
            .split(' ')
            .enumerate()
            .map(|(i, word)| {
                if i == 0 {
                    word.to_string()
                } else {
                    format!(" {word}")
                }
            })
            .collect();
        Self::from_chunks(chunks)
    }

    /// Content streamed exactly as the given deltas
    pub fn from_chunks<I, T>(chunks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            disconnect_after_chunks: None,
            fail_after_chunks: None,
        }
    }

    pub fn with_disconnect_after(mut self, chunks: usize) -> Self {
        self.disconnect_after_chunks = Some(chunks);
        self
    }

    pub fn with_failure_after(mut self, chunks: usize) -> Self {
        self.fail_after_chunks = Some(chunks);
        self
    }

    fn content(&self) -> String {
        self.chunks.concat()
    }

    fn generate_response(&self, id: &str, model: &str) -> ChatCompletionResponse {
        let content = self.content();
        let output_tokens = content.split_whitespace().count() as i32;
        ChatCompletionResponse {
            id: Some(id.to_string()),
            model: Some(model.to_string()),
            choices: vec![ChatCompletionResponseChoice {
                index: Some(0),
                message: Some(ChatResponseMessage {
                    role: Some("assistant".to_string()),
                    content: Some(content),
                }),
                finish_reason: Some("stop".to_string()),
            }],
            usage: Some(TokenUsage::new(1, output_tokens)),
        }
    }

    fn generate_events(&self, id: &str, model: &str) -> Vec<Result<SSEEvent, CompletionError>> {
        let mut events = Vec::new();

        for (i, delta) in self.chunks.iter().enumerate() {
            if self.disconnect_after_chunks == Some(i) {
                return events;
            }
            if self.fail_after_chunks == Some(i) {
                events.push(Err(CompletionError::CompletionError(
                    "connection reset by peer".to_string(),
                )));
                return events;
            }

            let chunk = ChatCompletionChunk {
                id: Some(id.to_string()),
                object: Some("chat.completion.chunk".to_string()),
                created: Some(0),
                model: Some(model.to_string()),
                choices: vec![ChatChoice {
                    index: Some(0),
                    delta: Some(ChatDelta {
                        role: (i == 0).then(|| "assistant".to_string()),
                        content: Some(delta.clone()),
                    }),
                    finish_reason: (i + 1 == self.chunks.len()).then(|| "stop".to_string()),
                }],
                usage: None,
            };
            // Serializing a plain struct cannot fail
            let data = serde_json::to_string(&chunk).unwrap_or_default();
            events.push(Ok(SSEEvent { data, chunk }));
        }

        events
    }
}

/// Configuration for the mock provider
struct MockConfig {
    response: ResponseTemplate,
    error_override: Option<CompletionError>,
    requests: Vec<ChatCompletionParams>,
}

/// Mock provider that implements InferenceProvider for testing
#[derive(Clone)]
pub struct MockProvider {
    config: Arc<Mutex<MockConfig>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            config: Arc::new(Mutex::new(MockConfig {
                response: ResponseTemplate::new("1. 2. 3."),
                error_override: None,
                requests: Vec::new(),
            })),
        }
    }

    pub async fn set_response(&self, response: ResponseTemplate) {
        self.config.lock().await.response = response;
    }

    /// Make every subsequent call fail before any output is produced
    pub async fn set_error_override(&self, error: Option<CompletionError>) {
        self.config.lock().await.error_override = error;
    }

    /// Requests received so far, in arrival order
    pub async fn requests(&self) -> Vec<ChatCompletionParams> {
        self.config.lock().await.requests.clone()
    }

    fn generate_chat_id() -> String {
        format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
    }

    async fn record(&self, params: &ChatCompletionParams) -> Result<ResponseTemplate, CompletionError> {
        let mut config = self.config.lock().await;
        config.requests.push(params.clone());
        match &config.error_override {
            Some(error) => Err(error.clone()),
            None => Ok(config.response.clone()),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceProvider for MockProvider {
    async fn chat_completion(
        &self,
        params: ChatCompletionParams,
    ) -> Result<ChatCompletionResponseWithBytes, CompletionError> {
        let template = self.record(&params).await?;
        let response = template.generate_response(&Self::generate_chat_id(), &params.model);
        let raw_bytes = serde_json::to_vec(&response)
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        Ok(ChatCompletionResponseWithBytes {
            response,
            raw_bytes,
        })
    }

    async fn chat_completion_stream(
        &self,
        params: ChatCompletionParams,
    ) -> Result<StreamingResult, CompletionError> {
        let template = self.record(&params).await?;
        let events = template.generate_events(&Self::generate_chat_id(), &params.model);
        Ok(Box::pin(stream::iter(events)))
    }
}
