//! Top-level error type for the chat engine crate.
//!
//! Domain errors the graph itself produces (`input_invalid`,
//! `retrieval_failed`, ...) are carried as plain strings in
//! [`chat_graph::ChatGraphState::error`] per the design's error taxonomy —
//! they cross the wire as data, not as this type. `EngineError` is reserved
//! for failures outside the graph: configuration, persistence, and the
//! worker/graph infrastructure errors that bubble up to the entrypoint.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("graph error: {0}")]
    Graph(#[from] chat_graph::GraphError),

    #[error("worker error: {0}")]
    Worker(#[from] chat_workers::WorkerError),

    #[error("{0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
