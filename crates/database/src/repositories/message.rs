use crate::pool::DbPool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use services::chats::{MessageId, MessageRepository, StreamingMessage};
use uuid::Uuid;

pub struct PgMessageRepository {
    pool: DbPool,
}

impl PgMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_message(row: tokio_postgres::Row) -> Result<StreamingMessage> {
        let id: Uuid = row.try_get("id")?;
        Ok(StreamingMessage {
            id: id.into(),
            content: row.try_get("content")?,
            complete: row.try_get("complete")?,
        })
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn get_message(&self, id: MessageId) -> Result<Option<StreamingMessage>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_opt(
                "SELECT id, content, complete FROM messages WHERE id = $1",
                &[&id.0],
            )
            .await
            .context("Failed to query message")?;

        row.map(Self::row_to_message).transpose()
    }

    async fn begin_message(&self, id: MessageId) -> Result<StreamingMessage> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_one(
                r#"
            INSERT INTO messages (id, content, complete) VALUES ($1, '', FALSE)
            ON CONFLICT (id) DO UPDATE SET content = '', complete = FALSE, updated_at = NOW()
            RETURNING id, content, complete
            "#,
                &[&id.0],
            )
            .await
            .context("Failed to begin message")?;

        Self::row_to_message(row)
    }

    async fn update_content(&self, id: MessageId, content: &str, complete: bool) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let updated = client
            .execute(
                "UPDATE messages SET content = $2, complete = $3, updated_at = NOW() WHERE id = $1",
                &[&id.0, &content, &complete],
            )
            .await
            .context("Failed to update message content")?;

        Ok(updated > 0)
    }
}
