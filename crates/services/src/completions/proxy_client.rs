use super::ports::{ByteStream, CompletionError, ProxyClient};
use async_trait::async_trait;
use futures::TryStreamExt;
use inference_providers::ChatCompletionParams;
use reqwest::{header, Client, Response};
use serde::Serialize;
use std::time::Duration;

/// Body sent to the proxy; the proxy decides streaming from the route
#[derive(Serialize)]
struct ProxyRequestBody<'a> {
    model: &'a str,
    messages: &'a [inference_providers::ChatMessage],
}

impl<'a> From<&'a ChatCompletionParams> for ProxyRequestBody<'a> {
    fn from(params: &'a ChatCompletionParams) -> Self {
        Self {
            model: &params.model,
            messages: &params.messages,
        }
    }
}

/// HTTP client for the proxy's `/chat` and `/stream-chat` routes
pub struct HttpProxyClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpProxyClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Turn a non-2xx answer into `Provider` with the proxy's envelope as details
    async fn check_status(response: Response) -> Result<Response, CompletionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let details = serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body));
        tracing::warn!(status = status.as_u16(), "Proxy returned an error");
        Err(CompletionError::Provider {
            status: Some(status.as_u16()),
            details,
        })
    }
}

#[async_trait]
impl ProxyClient for HttpProxyClient {
    async fn chat(&self, request: &ChatCompletionParams) -> Result<serde_json::Value, CompletionError> {
        let response = self
            .client
            .post(self.url("chat"))
            .timeout(self.request_timeout)
            .json(&ProxyRequestBody::from(request))
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| CompletionError::Parse(e.to_string()))
    }

    async fn stream_chat(&self, request: &ChatCompletionParams) -> Result<ByteStream, CompletionError> {
        // Only the wait for headers is bounded here; the body has its own deadline in the relay
        let send = self
            .client
            .post(self.url("stream-chat"))
            .header(header::ACCEPT, "text/event-stream")
            .json(&ProxyRequestBody::from(request))
            .send();
        let response = tokio::time::timeout(self.request_timeout, send)
            .await
            .map_err(|_| CompletionError::Timeout)??;

        let response = Self::check_status(response).await?;
        Ok(Box::pin(response.bytes_stream().map_err(CompletionError::from)))
    }
}
