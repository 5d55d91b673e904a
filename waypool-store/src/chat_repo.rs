use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use waypool_core::model::ChatMessage;
use waypool_core::repository::ChatRepository;
use waypool_core::Result;

use crate::db_err;

#[derive(sqlx::FromRow)]
struct ChatRow {
    id: Uuid,
    booking_id: Uuid,
    sender_id: Uuid,
    body: String,
    sent_at: DateTime<Utc>,
}

impl From<ChatRow> for ChatMessage {
    fn from(row: ChatRow) -> Self {
        ChatMessage {
            id: row.id,
            booking_id: row.booking_id,
            sender_id: row.sender_id,
            body: row.body,
            sent_at: row.sent_at,
        }
    }
}

pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn append(&self, message: &ChatMessage) -> Result<()> {
        sqlx::query(
            "INSERT INTO chat_messages (id, booking_id, sender_id, body, sent_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(message.id)
        .bind(message.booking_id)
        .bind(message.sender_id)
        .bind(&message.body)
        .bind(message.sent_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn by_booking(&self, booking_id: Uuid) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, ChatRow>(
            "SELECT id, booking_id, sender_id, body, sent_at FROM chat_messages \
             WHERE booking_id = $1 ORDER BY sent_at ASC",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }
}
