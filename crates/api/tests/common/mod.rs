#![allow(dead_code)]

use api::{build_app, routes::health::ProviderSummary};
use inference_providers::mock::ResponseTemplate;
use inference_providers::MockProvider;
use serde_json::json;
use std::sync::Arc;

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::level_filters::LevelFilter::DEBUG)
        .try_init();
}

pub const TEST_PROVIDER_URL: &str = "https://provider.test/v1";

/// Proxy router over `provider`
pub fn mock_app(provider: MockProvider) -> axum::Router {
    build_app(
        Arc::new(provider),
        ProviderSummary {
            base_url: TEST_PROVIDER_URL.to_string(),
            credential_configured: true,
        },
    )
}

/// Test server over a mock provider; the provider handle is returned for assertions
pub async fn setup_test_server(template: ResponseTemplate) -> (axum_test::TestServer, MockProvider) {
    init_test_tracing();

    let provider = MockProvider::new();
    provider.set_response(template).await;
    let server = axum_test::TestServer::new(mock_app(provider.clone()))
        .expect("Failed to create test server");
    (server, provider)
}

/// Serve the proxy on a real local port, for clients that need a URL
pub async fn spawn_proxy(provider: MockProvider) -> String {
    init_test_tracing();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let address = listener.local_addr().expect("No local address");
    let app = mock_app(provider);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test proxy failed");
    });
    format!("http://{address}")
}

pub fn chat_body(content: &str) -> serde_json::Value {
    json!({
        "model": "gpt-3.5-turbo",
        "messages": [{"role": "user", "content": content}]
    })
}

/// Payloads of every `data:` line in an event-stream body
pub fn data_lines(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(str::to_string)
        .collect()
}
