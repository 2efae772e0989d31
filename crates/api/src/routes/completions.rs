use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::{header, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json as ResponseJson, Response,
    },
};
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use services::proxy::{ErrorEnvelope, ProxyError, ProxyRequest};
use std::time::Duration;
use tracing::debug;
use utoipa::ToSchema;

/// Request body accepted by both completion routes
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequestBody {
    /// Provider model identifier
    pub model: String,
    /// Ordered `{role, content}` messages
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<serde_json::Value>,
}

/// Parse the body into a request; malformed JSON or a wrong content type is a validation error
fn parse_request(body: Result<Json<serde_json::Value>, JsonRejection>) -> Result<ProxyRequest, ProxyError> {
    let Json(body) = body.map_err(|rejection| ProxyError::Validation(rejection.body_text()))?;
    ProxyRequest::from_json(&body)
}

fn error_response(error: ProxyError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, ResponseJson(error.envelope())).into_response()
}

/// Single-shot chat completion
///
/// Forwards the request to the provider and returns its JSON body unmodified.
#[utoipa::path(
    post,
    path = "/chat",
    tag = "Chat",
    request_body = ChatRequestBody,
    responses(
        (status = 200, description = "Provider completion response"),
        (status = 400, description = "Invalid request", body = ErrorEnvelope),
        (status = 500, description = "Provider or transport failure", body = ErrorEnvelope)
    )
)]
pub async fn chat(
    State(app_state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    let request = match parse_request(body) {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };
    debug!(model = %request.model, message_count = request.messages.len(), "Chat request");

    match app_state.proxy_service.complete(request).await {
        Ok(response) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            response.raw_bytes,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// Streamed chat completion
///
/// One `data: <chunk>` event per provider chunk, then `data: [DONE]`.
/// A provider failure after the first event closes the connection without the sentinel.
#[utoipa::path(
    post,
    path = "/stream-chat",
    tag = "Chat",
    request_body = ChatRequestBody,
    responses(
        (status = 200, description = "Server-sent event stream", content_type = "text/event-stream"),
        (status = 400, description = "Invalid request", body = ErrorEnvelope),
        (status = 500, description = "Provider or transport failure", body = ErrorEnvelope)
    )
)]
pub async fn stream_chat(
    State(app_state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    let request = match parse_request(body) {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };
    debug!(model = %request.model, message_count = request.messages.len(), "Stream chat request");

    let frames = match app_state.proxy_service.stream_complete(request).await {
        Ok(frames) => frames,
        Err(e) => return error_response(e),
    };

    let events = frames.map(|frame| frame.map(|data| Event::default().data(data)));

    let mut response = Sse::new(events)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(30)))
        .into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}
