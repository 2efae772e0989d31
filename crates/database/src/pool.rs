use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::info;

/// Connection pool type alias
pub type DbPool = Pool;

/// Create a connection pool from configuration
pub async fn create_pool(config: &config::DatabaseConfig) -> anyhow::Result<DbPool> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.dbname = Some(config.database.clone());
    cfg.user = Some(config.username.clone());
    cfg.password = Some(config.password.clone());
    cfg.pool = Some(PoolConfig::new(config.max_connections));

    let pool = build(cfg).await?;
    info!(
        "Database connection pool created: {}:{}/{}",
        config.host, config.port, config.database
    );
    Ok(pool)
}

/// Create a connection pool from a `postgres://` URL
pub async fn create_pool_from_url(url: &str) -> anyhow::Result<DbPool> {
    let mut cfg = Config::new();
    cfg.url = Some(url.to_string());
    build(cfg).await
}

async fn build(mut cfg: Config) -> anyhow::Result<DbPool> {
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let pool = cfg
        .create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| anyhow::anyhow!("Failed to create pool: {e}"))?;

    // Test the connection
    let client = pool
        .get()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {e}"))?;
    client
        .simple_query("SELECT 1")
        .await
        .map_err(|e| anyhow::anyhow!("Failed to test database connection: {e}"))?;
    info!("Database connection test successful");

    Ok(pool)
}
