//! `memoryLoad`: loads the per-conversation compressed memory
//! string. Missing key/row, or a storage fault, both resolve to `memory =
//! None` — the fault is nonfatal and only logged, never surfaced as
//! `state.error`.

use std::sync::Arc;

use async_trait::async_trait;
use chat_graph::{ChatGraphState, ChatSinks, GraphNode, Result, StatePatch};
use tracing::warn;

use crate::db::connection::DatabasePool;
use crate::db::repositories::ConversationMemoryRepository;

pub struct MemoryLoadNode {
    pool: Arc<DatabasePool>,
}

impl MemoryLoadNode {
    pub fn new(pool: Arc<DatabasePool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GraphNode for MemoryLoadNode {
    fn name(&self) -> &'static str {
        "memory_load"
    }

    async fn run(&self, state: &ChatGraphState, _sinks: &ChatSinks) -> Result<StatePatch> {
        if state.error.is_some() {
            return Ok(StatePatch::empty());
        }
        let Some(key) = &state.conversation_key else {
            return Ok(StatePatch::empty());
        };

        match ConversationMemoryRepository::get(&self.pool, key).await {
            Ok(Some(row)) => Ok(StatePatch { memory: Some(row.content), ..StatePatch::empty() }),
            Ok(None) => Ok(StatePatch::empty()),
            Err(err) => {
                warn!(error = %err, conversation_key = %key, "memory_load: storage fault, continuing without memory");
                Ok(StatePatch::empty())
            }
        }
    }
}
