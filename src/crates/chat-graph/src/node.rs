//! The node trait every graph stage implements.

use crate::error::Result;
use crate::state::{ChatGraphState, ChatSinks, StatePatch};
use async_trait::async_trait;

/// One stage of the fixed ten-node topology. A node reads the live state and
/// returns a [`StatePatch`] describing what it wants to change; it never
/// mutates `state` directly, keeping the merge logic centralized in
/// [`ChatGraphState::apply`].
#[async_trait]
pub trait GraphNode: Send + Sync {
    /// Stable name used in logs and in `GraphError::NodeExecution`.
    fn name(&self) -> &'static str;

    async fn run(&self, state: &ChatGraphState, sinks: &ChatSinks) -> Result<StatePatch>;
}
