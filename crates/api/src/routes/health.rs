use crate::AppState;
use axum::{extract::State, http::StatusCode, response::Json as ResponseJson};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Which provider this proxy forwards to; never includes the credential
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderSummary {
    pub base_url: String,
    pub credential_configured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProxyHealth {
    pub status: String,
    pub provider: ProviderSummary,
}

/// Proxy liveness plus the provider it is wired to
///
/// The provider itself is not contacted.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Proxy is up", body = ProxyHealth),
    ),
    tag = "Health"
)]
pub async fn health_check(State(app_state): State<AppState>) -> (StatusCode, ResponseJson<ProxyHealth>) {
    (
        StatusCode::OK,
        ResponseJson(ProxyHealth {
            status: "ok".to_string(),
            provider: app_state.provider.as_ref().clone(),
        }),
    )
}
