//! Abstract external collaborators the graph nodes are built against.
//!
//! `chat-graph` already treats the chat/embedding/rerank models as trait
//! objects behind `ChatModel`/`EmbeddingModel`/`RerankModel`; this module
//! extends the same treatment to the handful of other outside systems the
//! node descriptions name but never type: the knowledge-base snapshot, the
//! translator, local and web retrieval, the document generator, the
//! suggestion generator, and the conversation-memory updater. Concrete
//! implementations (a real vector index, a real web search API, ...) are
//! out of scope and are injected by whatever assembles the graph.

use async_trait::async_trait;
use chat_graph::llm::ChatTokenStream;
use chat_graph::ChatSource;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::Result;

/// One file entry in a knowledge-base snapshot, as read by `kbOverview`.
#[derive(Debug, Clone)]
pub struct KbFile {
    pub name: String,
    pub updated_at: DateTime<Utc>,
    pub chunk_count: usize,
    pub tags: Vec<String>,
}

/// One tag known to the knowledge base.
#[derive(Debug, Clone)]
pub struct KbTag {
    pub id: String,
    pub name: String,
}

/// `{files, availableTags}` the kbOverview stage renders.
#[derive(Debug, Clone, Default)]
pub struct KbSnapshot {
    pub files: Vec<KbFile>,
    pub available_tags: Vec<KbTag>,
}

#[async_trait]
pub trait KbSnapshotProvider: Send + Sync {
    async fn snapshot(&self) -> Result<KbSnapshot>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target_lang` (an ISO-639-1-ish code, e.g. `"zh"`).
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String>;
}

/// Result of one local hybrid-retrieval pass.
#[derive(Debug, Clone, Default)]
pub struct LocalRetrievalResult {
    pub context: String,
    pub sources: Vec<ChatSource>,
    pub is_global_search: bool,
    pub metrics: HashMap<String, serde_json::Value>,
    /// Set when the index has no content at all; `retrieve` short-circuits
    /// generation by emitting this directly as the final answer.
    pub empty_index_message: Option<String>,
}

#[async_trait]
pub trait LocalRetriever: Send + Sync {
    async fn retrieve(
        &self,
        query: &str,
        sources: Option<&[String]>,
        tags: Option<&[String]>,
    ) -> Result<LocalRetrievalResult>;
}

/// One web-search hit, folded into `context` and `usedSources` when
/// `searchIntent` is set.
#[derive(Debug, Clone)]
pub struct WebHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub site_name: Option<String>,
}

#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<WebHit>>;
}

#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    /// `docGenerate`'s external collaborator: `(question, sources) -> chunk
    /// stream`, same streaming discipline as `generate`.
    async fn generate(&self, question: &str, sources: Option<&[String]>) -> Result<ChatTokenStream>;
}

#[async_trait]
pub trait SuggestionGenerator: Send + Sync {
    async fn suggest(&self, context: &str, count: usize, tone: &str) -> Result<Vec<String>>;
}

/// Computes the next compressed-memory string from the prior memory plus the
/// turn that just completed. Storage of the result is the engine's own
/// `ConversationMemoryRepository`, not part of this trait.
#[async_trait]
pub trait MemoryUpdater: Send + Sync {
    async fn update(&self, memory: Option<&str>, question: &str, answer: &str) -> Result<String>;
}
