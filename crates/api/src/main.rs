use api::{build_app, init_tracing, routes::health::ProviderSummary};
use config::ProxyConfig;
use inference_providers::{OpenAiCompatibleConfig, OpenAiCompatibleProvider};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // Load configuration first; nothing binds without the provider credential
    let config = ProxyConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        eprintln!("The proxy cannot start without OPENAI_API_KEY.");
        std::process::exit(1);
    });

    init_tracing(&config.logging);

    let provider = OpenAiCompatibleProvider::new(OpenAiCompatibleConfig {
        base_url: config.provider.base_url.clone(),
        api_key: config.provider.api_key.clone(),
        timeout_seconds: config.provider.timeout_seconds,
    })
    .unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to create provider client");
        std::process::exit(1);
    });

    let summary = ProviderSummary {
        base_url: config.provider.base_url.clone(),
        credential_configured: !config.provider.api_key.is_empty(),
    };
    let app = build_app(Arc::new(provider), summary);

    let bind_address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(address = %bind_address, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    tracing::info!(address = %bind_address, provider = %config.provider.base_url, "Server started successfully");
    tracing::info!("API Endpoints:");
    tracing::info!("  - POST /chat (Chat completion)");
    tracing::info!("  - POST /stream-chat (Streaming chat completion)");
    tracing::info!("  - GET /health");
    tracing::info!("  - GET /api-docs/openapi.json");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
