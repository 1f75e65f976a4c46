//! Provider-agnostic traits for the capabilities the chat pipeline treats as
//! abstract: the chat model, the embedding model, and the reranker.
//!
//! This crate does not ship concrete provider clients (OpenAI, Claude,
//! Ollama, ...). Callers construct the graph with their own `Arc<dyn
//! ChatModel>` / `Arc<dyn EmbeddingModel>` / `Arc<dyn RerankModel>` and the
//! pipeline drives them through these trait objects only.

mod embedding;
mod request;
mod response;
mod traits;

pub use embedding::{EmbeddingModel, ProgressSink, RerankModel};
pub use request::ChatRequest;
pub use response::ChatTokenStream;
pub use traits::ChatModel;
