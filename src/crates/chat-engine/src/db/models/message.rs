//! A single turn in a conversation. `sources` is stored as a JSON text
//! column (the serialized form of `Vec<chat_graph::ChatSource>`) rather than
//! a normalized table, since it is read-only history once a turn completes.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_key: String,
    pub role: String,
    pub content: String,
    pub timestamp: String,
    pub status: Option<String>,
    pub sources: Option<String>,
}
