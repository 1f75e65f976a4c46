//! Per-conversation compressed memory, read by `memoryLoad` and written by
//! `memoryUpdate`. One row per conversation key; absence means "no memory
//! yet", not an error (see `memory_load`'s `persistence_soft_fail` policy).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ConversationMemory {
    pub key: String,
    pub content: String,
}
