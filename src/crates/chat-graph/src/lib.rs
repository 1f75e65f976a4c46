//! Core graph execution engine for the chat pipeline.
//!
//! This crate owns the two things every node and every external capability
//! agree on: the per-request [`state::ChatGraphState`] and its merge rules,
//! and the [`graph::ChatGraphRunner`] that walks the fixed ten-stage
//! topology. Node implementations, the worker pool, and the persistent
//! store all live in sibling crates and depend on this one.

pub mod error;
pub mod graph;
pub mod llm;
pub mod messages;
pub mod node;
pub mod state;

pub use error::{GraphError, Result};
pub use graph::{ChatGraphRunner, GroundingNext, Route};
pub use messages::{Message, MessageRole};
pub use node::GraphNode;
pub use state::{ChatGraphState, ChatSinks, ChatSource, GroundingStatus, KbOverviewData, SourceType, StatePatch};
