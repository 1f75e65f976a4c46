//! Error types for graph construction and execution.
//!
//! Mirrors the error taxonomy in the design: input validation, retrieval and
//! generation failures are carried in [`ChatGraphState::error`](crate::state::ChatGraphState)
//! as plain strings (so they can flow through the wire as part of the final
//! record), while this module's [`GraphError`] is reserved for failures the
//! runner itself cannot recover from (a node panicking, a malformed patch).

use thiserror::Error;

/// Errors raised by the graph runner itself, as opposed to domain errors
/// recorded in `ChatGraphState::error`.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node returned an error instead of a patch.
    #[error("node '{node}' failed: {source}")]
    NodeExecution {
        node: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The question was empty after trimming.
    #[error("empty_question")]
    EmptyQuestion,

    /// Catch-all for integration failures (storage, network) that a node
    /// chose not to swallow.
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;

impl GraphError {
    pub fn node(node: &'static str, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        GraphError::NodeExecution {
            node,
            source: Box::new(source),
        }
    }
}
