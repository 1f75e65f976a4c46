//! Per-conversation compressed memory repository, read by `memoryLoad` and
//! written by `memoryUpdate`.

use crate::db::connection::DatabasePool;
use crate::db::models::ConversationMemory;

pub struct ConversationMemoryRepository;

impl ConversationMemoryRepository {
    pub async fn get(
        pool: &DatabasePool,
        key: &str,
    ) -> Result<Option<ConversationMemory>, sqlx::Error> {
        sqlx::query_as::<_, ConversationMemory>(
            "SELECT * FROM conversation_memory WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(pool)
        .await
    }

    /// Insert or replace the stored memory for a conversation key.
    pub async fn upsert(
        pool: &DatabasePool,
        key: &str,
        content: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO conversation_memory (key, content) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET content = excluded.content",
        )
        .bind(key)
        .bind(content)
        .execute(pool)
        .await?;
        Ok(())
    }
}
