//! OpenAI-compatible provider implementation
//!
//! Handles any provider that speaks OpenAI's chat completions API:
//! - OpenAI (api.openai.com)
//! - Azure OpenAI
//! - Together AI, Groq, Fireworks AI and similar

use crate::{
    sse_parser::SSEParser, ChatCompletionParams, ChatCompletionResponse,
    ChatCompletionResponseWithBytes, CompletionError, InferenceProvider, StreamingResult,
};
use async_trait::async_trait;
use reqwest::{header::HeaderValue, Client};
use std::time::Duration;

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Clone)]
pub struct OpenAiCompatibleConfig {
    /// Base URL for the API (e.g., "https://api.openai.com/v1")
    pub base_url: String,
    pub api_key: String,
    /// Single-shot calls: bound on the whole request, body included.
    /// Streaming calls: bound on the wait for response headers only; the
    /// body runs until the provider finishes or the caller disconnects.
    pub timeout_seconds: u64,
}

/// Pass-through provider for OpenAI-format APIs.
///
/// The credential lives here and only here; callers never see it.
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| {
                CompletionError::CompletionError(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn build_headers(&self) -> Result<reqwest::header::HeaderMap, CompletionError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let auth_value = format!("Bearer {}", self.config.api_key);
        let header_value = HeaderValue::from_str(&auth_value).map_err(|e| {
            CompletionError::CompletionError(format!("Invalid API key format: {e}"))
        })?;
        headers.insert("Authorization", header_value);

        Ok(headers)
    }

    async fn send(
        &self,
        params: &ChatCompletionParams,
    ) -> Result<reqwest::Response, CompletionError> {
        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let request = self
            .client
            .post(self.chat_url())
            .headers(self.build_headers()?)
            .json(params);

        let response = if params.stream == Some(true) {
            // A request timeout would also cut the body off mid-stream
            tokio::time::timeout(timeout, request.send())
                .await
                .map_err(|_| CompletionError::Timeout)??
        } else {
            request.timeout(timeout).send().await?
        };

        if !response.status().is_success() {
            let status_code = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response body: {e}"));
            tracing::warn!(status_code, model = %params.model, "Provider rejected request");
            return Err(CompletionError::HttpError {
                status_code,
                message,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl InferenceProvider for OpenAiCompatibleProvider {
    async fn chat_completion(
        &self,
        params: ChatCompletionParams,
    ) -> Result<ChatCompletionResponseWithBytes, CompletionError> {
        let mut non_streaming_params = params;
        non_streaming_params.stream = None;

        let response = self.send(&non_streaming_params).await?;

        // Keep the exact bytes so the proxy can return them unmodified
        let raw_bytes = response.bytes().await?.to_vec();

        let chat_response: ChatCompletionResponse = serde_json::from_slice(&raw_bytes)
            .map_err(|e| CompletionError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        Ok(ChatCompletionResponseWithBytes {
            response: chat_response,
            raw_bytes,
        })
    }

    async fn chat_completion_stream(
        &self,
        params: ChatCompletionParams,
    ) -> Result<StreamingResult, CompletionError> {
        let mut streaming_params = params;
        streaming_params.stream = Some(true);

        let response = self.send(&streaming_params).await?;

        let sse_stream = SSEParser::new(Box::pin(response.bytes_stream()));
        Ok(Box::pin(sse_stream))
    }
}
