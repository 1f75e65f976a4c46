//! A conversation: the thread a `conversation_key` groups messages under.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Conversation {
    pub key: String,
    pub label: Option<String>,
    pub timestamp: String,
    pub created_at: String,
}
