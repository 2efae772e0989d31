pub mod openapi;
pub mod routes;

use crate::{
    openapi::ApiDoc,
    routes::{
        completions::{chat, stream_chat},
        health::{health_check, ProviderSummary},
    },
};
use axum::{
    response::Json as ResponseJson,
    routing::{get, post},
    Router,
};
use config::LoggingConfig;
use inference_providers::InferenceProvider;
use services::ProxyService;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub proxy_service: Arc<ProxyService>,
    pub provider: Arc<ProviderSummary>,
}

/// Build the proxy router around `provider`; `summary` is what `/health` reports about it
pub fn build_app(provider: Arc<dyn InferenceProvider>, summary: ProviderSummary) -> Router {
    let app_state = AppState {
        proxy_service: Arc::new(ProxyService::new(provider)),
        provider: Arc::new(summary),
    };

    Router::new()
        .route("/chat", post(chat))
        .route("/stream-chat", post(stream_chat))
        .route("/health", get(health_check))
        .route(
            "/api-docs/openapi.json",
            get(|| async { ResponseJson(ApiDoc::openapi()) }),
        )
        .with_state(app_state)
        // Called directly from the browser app
        .layer(CorsLayer::permissive())
}

pub fn init_tracing(logging_config: &LoggingConfig) {
    let filter = logging_config.filter_directive();

    // Initialize tracing based on the format specified in config
    match logging_config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .init();
        }
    }
}
