//! Proxy service: the credential-holding side of the relay
//!
//! Validates `{model, messages}` request bodies, forwards them to the
//! configured [`InferenceProvider`] and translates every failure into the
//! `{error, details}` envelope returned to callers.

use futures::stream::{self, Stream};
use inference_providers::{
    ChatCompletionParams, ChatCompletionResponseWithBytes, ChatMessage, CompletionError,
    InferenceProvider, StreamingResult, DONE_SENTINEL,
};
use serde::Serialize;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const VALIDATION_ERROR_MESSAGE: &str = "Invalid request";
pub const PROVIDER_ERROR_MESSAGE: &str = "An error occurred while processing the request";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Event payloads as they go out on the wire, `[DONE]` last
pub type ProxyEventStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

/// A validated `/chat` or `/stream-chat` request body
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl ProxyRequest {
    pub fn from_json(body: &Value) -> Result<Self, ProxyError> {
        let Some(object) = body.as_object() else {
            return Err(ProxyError::Validation(
                "Request body must be a JSON object".to_string(),
            ));
        };

        let model = match object.get("model").and_then(Value::as_str) {
            Some(model) if !model.trim().is_empty() => model.to_string(),
            _ => {
                return Err(ProxyError::Validation(
                    "Model must be a non-empty string".to_string(),
                ))
            }
        };

        let Some(raw_messages) = object.get("messages").and_then(Value::as_array) else {
            return Err(ProxyError::Validation(
                "Messages must be an array".to_string(),
            ));
        };

        let messages = raw_messages
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                serde_json::from_value::<ChatMessage>(raw.clone())
                    .map_err(|e| ProxyError::Validation(format!("messages[{i}] is invalid: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { model, messages })
    }

    fn into_params(self, stream: bool) -> ChatCompletionParams {
        ChatCompletionParams {
            model: self.model,
            messages: self.messages,
            stream: stream.then_some(true),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Provider(#[from] CompletionError),
}

/// Body of every error response the proxy sends
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct ErrorEnvelope {
    pub error: String,
    #[schema(value_type = Object)]
    pub details: Value,
}

impl ProxyError {
    /// Upstream status when the provider supplied one, 400 for bad input, else 500
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::Validation(_) => 400,
            ProxyError::Provider(e) => e.status_code().unwrap_or(500),
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            ProxyError::Validation(reason) => ErrorEnvelope {
                error: VALIDATION_ERROR_MESSAGE.to_string(),
                details: Value::String(reason.clone()),
            },
            ProxyError::Provider(CompletionError::HttpError { message, .. }) => ErrorEnvelope {
                error: PROVIDER_ERROR_MESSAGE.to_string(),
                details: serde_json::from_str(message)
                    .unwrap_or_else(|_| Value::String(message.clone())),
            },
            ProxyError::Provider(e) => ErrorEnvelope {
                error: UNEXPECTED_ERROR_MESSAGE.to_string(),
                details: Value::String(e.to_string()),
            },
        }
    }
}

#[derive(Clone)]
pub struct ProxyService {
    provider: Arc<dyn InferenceProvider>,
}

impl ProxyService {
    pub fn new(provider: Arc<dyn InferenceProvider>) -> Self {
        Self { provider }
    }

    /// Single-shot completion; the provider's body is returned byte for byte
    pub async fn complete(
        &self,
        request: ProxyRequest,
    ) -> Result<ChatCompletionResponseWithBytes, ProxyError> {
        let model = request.model.clone();
        let message_count = request.messages.len();
        info!(%model, message_count, "Forwarding chat completion");

        self.provider
            .chat_completion(request.into_params(false))
            .await
            .map_err(|e| {
                error!(%model, message_count, error = %e, "Chat completion failed");
                ProxyError::Provider(e)
            })
    }

    /// Streamed completion. Errors before the provider answers are returned
    /// here; once the stream is handed out, a failure ends it with an `Err`
    /// item and no sentinel.
    pub async fn stream_complete(&self, request: ProxyRequest) -> Result<ProxyEventStream, ProxyError> {
        let model = request.model.clone();
        let message_count = request.messages.len();
        info!(%model, message_count, "Forwarding streaming chat completion");

        let events = self
            .provider
            .chat_completion_stream(request.into_params(true))
            .await
            .map_err(|e| {
                error!(%model, message_count, error = %e, "Streaming chat completion failed");
                ProxyError::Provider(e)
            })?;

        Ok(frame_events(events, model))
    }
}

enum FrameState {
    Streaming(StreamingResult),
    Done,
}

/// Payloads of `events` in order, followed by `[DONE]` if the provider stream ended cleanly
fn frame_events(events: StreamingResult, model: String) -> ProxyEventStream {
    let frames = stream::unfold(
        (FrameState::Streaming(events), model, 0usize),
        |(state, model, forwarded)| async move {
            let FrameState::Streaming(mut events) = state else {
                return None;
            };

            loop {
                match futures::StreamExt::next(&mut events).await {
                    Some(Ok(event)) => {
                        return Some((
                            Ok(event.data),
                            (FrameState::Streaming(events), model, forwarded + 1),
                        ));
                    }
                    Some(Err(CompletionError::InvalidResponse(reason))) => {
                        warn!(%model, %reason, "Dropping malformed provider event");
                    }
                    Some(Err(e)) => {
                        error!(%model, forwarded, error = %e, "Provider stream failed mid-response");
                        return Some((Err(e), (FrameState::Done, model, forwarded)));
                    }
                    None => {
                        debug!(%model, forwarded, "Provider stream finished");
                        return Some((
                            Ok(DONE_SENTINEL.to_string()),
                            (FrameState::Done, model, forwarded),
                        ));
                    }
                }
            }
        },
    );

    Box::pin(frames)
}
