use crate::pool::DbPool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use services::chats::{ChatId, ChatRepository, ChatSession};
use tracing::debug;
use uuid::Uuid;

pub struct PgChatRepository {
    pool: DbPool,
}

impl PgChatRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_chat(row: tokio_postgres::Row) -> Result<ChatSession> {
        let id: Uuid = row.try_get("id")?;
        Ok(ChatSession {
            id: id.into(),
            total_tokens: row.try_get("total_tokens")?,
        })
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn get_chat(&self, id: ChatId) -> Result<Option<ChatSession>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_opt("SELECT id, total_tokens FROM chats WHERE id = $1", &[&id.0])
            .await
            .context("Failed to query chat")?;

        row.map(Self::row_to_chat).transpose()
    }

    /// Create the chat, or return the existing one unchanged
    async fn create_chat(&self, id: ChatId) -> Result<ChatSession> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_one(
                r#"
            INSERT INTO chats (id) VALUES ($1)
            ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id
            RETURNING id, total_tokens
            "#,
                &[&id.0],
            )
            .await
            .context("Failed to create chat")?;

        debug!("Created chat: {}", id);
        Self::row_to_chat(row)
    }

    async fn add_tokens(&self, id: ChatId, tokens: i64) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        // Single statement so concurrent relays never lose an increment
        let updated = client
            .execute(
                r#"
            UPDATE chats
            SET total_tokens = total_tokens + $2, updated_at = NOW()
            WHERE id = $1
            "#,
                &[&id.0, &tokens],
            )
            .await
            .context("Failed to update chat token total")?;

        Ok(updated > 0)
    }
}
