//! The chat model trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use chat_graph::llm::{ChatModel, ChatRequest};
//! use async_trait::async_trait;
//!
//! struct MyChatModel;
//!
//! #[async_trait]
//! impl ChatModel for MyChatModel {
//!     async fn stream(&self, request: ChatRequest) -> chat_graph::error::Result<chat_graph::llm::ChatTokenStream> {
//!         todo!()
//!     }
//!
//!     async fn complete(&self, prompt: &str) -> chat_graph::error::Result<String> {
//!         todo!()
//!     }
//! }
//! ```
use crate::error::Result;
use crate::llm::{ChatRequest, ChatTokenStream};
use async_trait::async_trait;

/// Provider-agnostic chat model interface. Implementations must be
/// `Send + Sync` so a single `Arc<dyn ChatModel>` can be shared across
/// concurrent requests.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Stream a response chunk-by-chunk. Used by the `generate` node and by
    /// the simulated streaming path in long-context mode.
    async fn stream(&self, request: ChatRequest) -> Result<ChatTokenStream>;

    /// Produce a complete, non-streamed response to a single prompt. Used by
    /// the Map-Reduce long-context analyzer, which issues many independent
    /// chunk-analysis prompts concurrently and does not want a stream per
    /// chunk.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
