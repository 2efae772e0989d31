//! Credential diagnostic: sends a single "hello" completion through a
//! running proxy using the client-side configuration and reports the result.

use anyhow::Context;
use api::init_tracing;
use config::ClientAppConfig;
use database::Database;
use services::completions::{CompletionServiceImpl, CompletionServiceTrait, HttpProxyClient};
use services::tokens::BpeTokenCounter;
use services::StreamRelay;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = ClientAppConfig::from_env().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let database = Database::from_config(&config.database)
        .await
        .context("Failed to connect to database")?;
    database.run_migrations().await?;

    let proxy = HttpProxyClient::new(
        config.client.proxy_url.clone(),
        Duration::from_secs(config.client.request_timeout_seconds),
    )?;
    let relay = StreamRelay::new(
        database.messages.clone(),
        database.chats.clone(),
        Arc::new(BpeTokenCounter::r50k()?),
    )
    .with_stream_timeout(Duration::from_secs(config.client.stream_timeout_seconds));
    let service = CompletionServiceImpl::new(
        Arc::new(proxy),
        database.settings.clone(),
        relay,
        config.client.default_model.clone(),
    );

    match service.check_provider_key().await {
        Ok(response) => {
            tracing::info!(proxy = %config.client.proxy_url, "Provider key accepted");
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!(proxy = %config.client.proxy_url, error = %e, "Provider key check failed");
            Err(e.into())
        }
    }
}
