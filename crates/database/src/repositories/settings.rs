use crate::pool::DbPool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use services::chats::{Settings, SettingsRepository};

pub struct PgSettingsRepository {
    pool: DbPool,
}

impl PgSettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Set or clear the model used by the completion orchestrator
    pub async fn set_model_identifier(&self, id: &str, model: Option<&str>) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        client
            .execute(
                r#"
            INSERT INTO settings (id, model_identifier) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET model_identifier = EXCLUDED.model_identifier, updated_at = NOW()
            "#,
                &[&id, &model],
            )
            .await
            .context("Failed to store settings")?;

        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for PgSettingsRepository {
    async fn get_settings(&self, id: &str) -> Result<Option<Settings>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_opt(
                "SELECT id, model_identifier FROM settings WHERE id = $1",
                &[&id],
            )
            .await
            .context("Failed to query settings")?;

        row.map(|row| -> Result<Settings> {
            Ok(Settings {
                id: row.try_get("id")?,
                model_identifier: row.try_get("model_identifier")?,
            })
        })
        .transpose()
    }
}
