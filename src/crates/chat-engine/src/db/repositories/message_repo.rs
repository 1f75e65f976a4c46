//! Message repository. Schema note: `sources` carries a JSON-serialized
//! `Vec<chat_graph::ChatSource>`; this repository treats it as an opaque
//! text column and leaves (de)serialization to the caller.

use crate::db::connection::DatabasePool;
use crate::db::models::StoredMessage;
use chrono::Utc;

pub struct MessageRepository;

impl MessageRepository {
    pub async fn create(
        pool: &DatabasePool,
        id: &str,
        conversation_key: &str,
        role: &str,
        content: &str,
        status: Option<&str>,
        sources: Option<&str>,
    ) -> Result<StoredMessage, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query_as::<_, StoredMessage>(
            "INSERT INTO messages (id, conversation_key, role, content, timestamp, status, sources)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(id)
        .bind(conversation_key)
        .bind(role)
        .bind(content)
        .bind(&now)
        .bind(status)
        .bind(sources)
        .fetch_one(pool)
        .await
    }

    pub async fn list_for_conversation(
        pool: &DatabasePool,
        conversation_key: &str,
    ) -> Result<Vec<StoredMessage>, sqlx::Error> {
        sqlx::query_as::<_, StoredMessage>(
            "SELECT * FROM messages WHERE conversation_key = ? ORDER BY timestamp ASC",
        )
        .bind(conversation_key)
        .fetch_all(pool)
        .await
    }

    pub async fn list_recent_for_conversation(
        pool: &DatabasePool,
        conversation_key: &str,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, sqlx::Error> {
        sqlx::query_as::<_, StoredMessage>(
            "SELECT * FROM messages WHERE conversation_key = ? ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(conversation_key)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn update_status(
        pool: &DatabasePool,
        id: &str,
        status: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE messages SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn count_for_conversation(
        pool: &DatabasePool,
        conversation_key: &str,
    ) -> Result<i64, sqlx::Error> {
        let result: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM messages WHERE conversation_key = ?")
                .bind(conversation_key)
                .fetch_one(pool)
                .await?;
        Ok(result.0)
    }
}
