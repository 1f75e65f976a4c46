//! `postcheck`: normalizes `usedSources` to at least the empty
//! sequence. Idempotent by construction — applying it twice is a no-op.

use async_trait::async_trait;
use chat_graph::{ChatGraphState, ChatSinks, GraphNode, Result, StatePatch};
use tracing::debug;

pub struct PostcheckNode;

#[async_trait]
impl GraphNode for PostcheckNode {
    fn name(&self) -> &'static str {
        "postcheck"
    }

    async fn run(&self, state: &ChatGraphState, _sinks: &ChatSinks) -> Result<StatePatch> {
        if state.error.is_some() {
            return Ok(StatePatch::empty());
        }

        let sources_count = state.used_sources.as_ref().map(Vec::len).unwrap_or(0);
        debug!(sources_count, "postcheck");

        if state.used_sources.is_some() {
            return Ok(StatePatch::empty());
        }

        Ok(StatePatch { used_sources: Some(Vec::new()), ..StatePatch::empty() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn normalizes_missing_used_sources_to_empty() {
        let node = PostcheckNode;
        let state = ChatGraphState::new("run-1", "hello");
        let patch = node.run(&state, &ChatSinks::default()).await.unwrap();
        assert_eq!(patch.used_sources, Some(Vec::new()));
    }

    #[tokio::test]
    async fn postcheck_is_idempotent() {
        let node = PostcheckNode;
        let mut state = ChatGraphState::new("run-1", "hello");
        let first = node.run(&state, &ChatSinks::default()).await.unwrap();
        state.apply(first);
        let second = node.run(&state, &ChatSinks::default()).await.unwrap();
        assert!(second.used_sources.is_none());
        assert_eq!(state.used_sources, Some(Vec::new()));
    }
}
