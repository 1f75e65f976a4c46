//! `memoryUpdate`: recomputes and persists the compressed
//! conversation memory. Implements the **Background** policy — the update
//! is dispatched without being awaited, so this request's state keeps its
//! current `memory` unchanged and the next request observes the persisted
//! value through `memoryLoad`. Chosen over the synchronous variant to keep
//! request latency independent of the memory updater's cost (see design
//! notes on the open question).

use std::sync::Arc;

use async_trait::async_trait;
use chat_graph::{ChatGraphState, ChatSinks, GraphNode, Result, StatePatch};
use tracing::warn;

use crate::capabilities::MemoryUpdater;
use crate::db::connection::DatabasePool;
use crate::db::repositories::ConversationMemoryRepository;

pub struct MemoryUpdateNode {
    pool: Arc<DatabasePool>,
    updater: Arc<dyn MemoryUpdater>,
}

impl MemoryUpdateNode {
    pub fn new(pool: Arc<DatabasePool>, updater: Arc<dyn MemoryUpdater>) -> Self {
        Self { pool, updater }
    }
}

#[async_trait]
impl GraphNode for MemoryUpdateNode {
    fn name(&self) -> &'static str {
        "memory_update"
    }

    async fn run(&self, state: &ChatGraphState, _sinks: &ChatSinks) -> Result<StatePatch> {
        let (Some(conversation_key), Some(answer)) = (&state.conversation_key, &state.answer) else {
            return Ok(StatePatch::empty());
        };

        let pool = Arc::clone(&self.pool);
        let updater = Arc::clone(&self.updater);
        let conversation_key = conversation_key.clone();
        let question = state.question.clone();
        let answer = answer.clone();
        let prior_memory = state.memory.clone();

        tokio::spawn(async move {
            let next_memory = match updater.update(prior_memory.as_deref(), &question, &answer).await {
                Ok(memory) => memory,
                Err(err) => {
                    warn!(error = %err, conversation_key, "memory_update: updater failed");
                    return;
                }
            };
            if next_memory.trim().is_empty() {
                return;
            }
            if let Err(err) = ConversationMemoryRepository::upsert(&pool, &conversation_key, &next_memory).await {
                warn!(error = %err, conversation_key, "memory_update: upsert failed");
            }
        });

        Ok(StatePatch::empty())
    }
}
