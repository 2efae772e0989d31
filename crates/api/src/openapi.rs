use crate::routes::{
    completions::ChatRequestBody,
    health::{ProviderSummary, ProxyHealth},
};
use services::proxy::ErrorEnvelope;
use utoipa::OpenApi;

/// OpenAPI documentation configuration
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Chat Relay Proxy",
        description = "Forwards chat completion requests to an OpenAI-compatible provider. The provider credential stays on this server.",
        version = "1.0.0",
        license(
            name = "MIT",
        )
    ),
    paths(
        crate::routes::completions::chat,
        crate::routes::completions::stream_chat,
        crate::routes::health::health_check,
    ),
    components(
        schemas(ChatRequestBody, ErrorEnvelope, ProviderSummary, ProxyHealth)
    ),
    tags(
        (name = "Chat", description = "Chat completion proxy"),
        (name = "Health", description = "Liveness"),
    )
)]
pub struct ApiDoc;
