//! Conversation repository

use crate::db::connection::DatabasePool;
use crate::db::models::Conversation;
use chrono::Utc;

pub struct ConversationRepository;

impl ConversationRepository {
    /// Create a conversation, or return the existing row unchanged if the
    /// key is already taken (a request replaying a known conversation key).
    pub async fn get_or_create(
        pool: &DatabasePool,
        key: &str,
        label: Option<&str>,
    ) -> Result<Conversation, sqlx::Error> {
        if let Some(existing) = Self::get_by_key(pool, key).await? {
            return Ok(existing);
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query_as::<_, Conversation>(
            "INSERT INTO conversations (key, label, timestamp, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING *",
        )
        .bind(key)
        .bind(label)
        .bind(&now)
        .bind(&now)
        .fetch_one(pool)
        .await
    }

    pub async fn get_by_key(
        pool: &DatabasePool,
        key: &str,
    ) -> Result<Option<Conversation>, sqlx::Error> {
        sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    pub async fn touch(pool: &DatabasePool, key: &str) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE conversations SET timestamp = ? WHERE key = ?")
            .bind(&now)
            .bind(key)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn list_recent(
        pool: &DatabasePool,
        limit: i64,
    ) -> Result<Vec<Conversation>, sqlx::Error> {
        sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &DatabasePool, key: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM conversations WHERE key = ?")
            .bind(key)
            .execute(pool)
            .await?;
        Ok(())
    }
}
