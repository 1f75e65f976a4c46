//! Embedding and reranking model traits.
//!
//! Both are implemented by heavy, stateful ML models that the worker pool
//! (in the `chat-workers` crate) isolates from the request loop. The traits
//! themselves are oblivious to that isolation: a `chat-workers` facade wraps
//! an `Arc<dyn EmbeddingModel>` and dispatches its calls to background
//! workers, reporting progress through [`ProgressSink`] during lazy
//! initialization.

use crate::error::Result;
use async_trait::async_trait;

/// Receives `(loaded, total)` byte progress for one named download/file
/// during model initialization. Implemented by the Progress Reporter.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, file: &str, loaded: u64, total: u64);
    fn on_complete(&self, file: &str);
}

#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Lazily load the model, reporting download/load progress. Called at
    /// most once in steady state; concurrent callers during initialization
    /// must observe the same outcome (see the facade in `chat-workers`).
    async fn init(&self, progress: &dyn ProgressSink) -> Result<()>;

    /// Embed a batch of documents. Implementations may internally chunk
    /// further, but the caller-facing contract is "one vector per input
    /// string, same order".
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait RerankModel: Send + Sync {
    async fn init(&self, progress: &dyn ProgressSink) -> Result<()>;

    /// Score `documents` against `query`; returns one score per document, in
    /// the same order as the input (the caller sorts).
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;
}
