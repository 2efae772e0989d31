pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_pool_from_url, DbPool};
pub use repositories::{PgChatRepository, PgMessageRepository, PgSettingsRepository};

use anyhow::Result;
use std::sync::Arc;

/// Database service combining all repositories
pub struct Database {
    pub settings: Arc<PgSettingsRepository>,
    pub messages: Arc<PgMessageRepository>,
    pub chats: Arc<PgChatRepository>,
    pool: DbPool,
}

impl Database {
    /// Create a new database service from a connection pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            settings: Arc::new(PgSettingsRepository::new(pool.clone())),
            messages: Arc::new(PgMessageRepository::new(pool.clone())),
            chats: Arc::new(PgChatRepository::new(pool.clone())),
            pool,
        }
    }

    /// Create a new database service from configuration
    pub async fn from_config(config: &config::DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        Ok(Self::new(pool))
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run(&self.pool).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}
