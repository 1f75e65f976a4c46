//! The public entrypoint: assembles the fixed ten-node topology from
//! injected capabilities and settings, then drives one request through it.
//! Exposes a `runChat({...}) -> {answer, usedSources, suggestedQuestions?,
//! error?}` contract.

use std::sync::Arc;

use chat_graph::llm::{ChatModel, EmbeddingModel, RerankModel};
use chat_graph::{ChatGraphRunner, ChatGraphState, ChatSinks, ChatSource};
use chat_workers::{EmbeddingFacade, GlobalProgress, ModelWorkerRuntime, ProgressReporter, RerankFacade, WorkerPool};

use crate::capabilities::{
    DocumentGenerator, KbSnapshotProvider, LocalRetriever, MemoryUpdater, SuggestionGenerator, Translator, WebSearcher,
};
use crate::config::EngineSettings;
use crate::db::connection::DatabasePool;
use crate::error::Result;
use crate::nodes::{
    DocGenerateNode, GenerateNode, GroundingCheckNode, KbOverviewNode, MemoryLoadNode, MemoryUpdateNode, PostcheckNode,
    PreprocessNode, RetrieveNode, SuggestNode, TranslateNode,
};

/// The collaborators the engine needs beyond the database and settings —
/// one trait object per abstract capability the engine depends on.
pub struct EngineCapabilities {
    pub chat_model: Arc<dyn ChatModel>,
    pub embedding_model: Arc<dyn EmbeddingModel>,
    pub rerank_model: Arc<dyn RerankModel>,
    pub kb_snapshot_provider: Arc<dyn KbSnapshotProvider>,
    pub translator: Arc<dyn Translator>,
    pub local_retriever: Arc<dyn LocalRetriever>,
    pub web_searcher: Arc<dyn WebSearcher>,
    pub document_generator: Arc<dyn DocumentGenerator>,
    pub suggestion_generator: Arc<dyn SuggestionGenerator>,
    pub memory_updater: Arc<dyn MemoryUpdater>,
}

/// Inputs to one `runChat` call. `run_id` identifies this request; the rest
/// mirror `ChatGraphState`'s input fields and the three streaming sinks.
pub struct RunChatRequest {
    pub run_id: String,
    pub conversation_key: Option<String>,
    pub question: String,
    pub sources: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub document_intent: Option<serde_json::Value>,
    pub on_token: Option<Arc<dyn Fn(String) + Send + Sync>>,
    pub on_sources: Option<Arc<dyn Fn(Vec<ChatSource>) + Send + Sync>>,
    pub on_suggestions: Option<Arc<dyn Fn(Vec<String>) + Send + Sync>>,
}

/// The final accumulated record a `runChat` call returns.
pub struct RunChatResponse {
    pub answer: Option<String>,
    pub used_sources: Vec<ChatSource>,
    pub suggested_questions: Option<Vec<String>>,
    pub error: Option<String>,
}

/// Owns the assembled graph runner, the embed/rerank facades that sit in
/// front of the worker pool, and the settings it was built from.
pub struct ChatEngine {
    runner: ChatGraphRunner,
    embedding: Arc<EmbeddingFacade>,
    rerank: Arc<RerankFacade>,
}

impl ChatEngine {
    pub fn new(pool: Arc<DatabasePool>, settings: &EngineSettings, capabilities: EngineCapabilities) -> Self {
        let embedding_reporter = Arc::new(ProgressReporter::new());
        let rerank_reporter = Arc::new(ProgressReporter::new());
        let runtime = ModelWorkerRuntime::new(
            Arc::clone(&capabilities.embedding_model),
            Arc::clone(&capabilities.rerank_model),
            Arc::clone(&embedding_reporter),
            Arc::clone(&rerank_reporter),
        );
        let worker_pool = Arc::new(WorkerPool::with_max_workers(Arc::new(runtime), settings.worker_pool.max_workers));
        let embedding = Arc::new(EmbeddingFacade::new(Arc::clone(&worker_pool), embedding_reporter));
        let rerank = Arc::new(RerankFacade::new(worker_pool, rerank_reporter));

        let runner = ChatGraphRunner {
            preprocess: Arc::new(PreprocessNode::new(settings.retrieval.web_search_enabled)),
            doc_generate: Arc::new(DocGenerateNode::new(capabilities.document_generator)),
            kb_overview: Arc::new(KbOverviewNode::new(capabilities.kb_snapshot_provider)),
            translate: Arc::new(TranslateNode::new(
                capabilities.translator,
                settings.retrieval.translation_target_language.clone(),
            )),
            memory_load: Arc::new(MemoryLoadNode::new(Arc::clone(&pool))),
            retrieve: Arc::new(RetrieveNode::new(capabilities.local_retriever, capabilities.web_searcher)),
            generate: Arc::new(GenerateNode::new(capabilities.chat_model, settings.chat_model_name.clone())),
            postcheck: Arc::new(PostcheckNode),
            grounding_check: Arc::new(GroundingCheckNode),
            suggest: Arc::new(SuggestNode::new(capabilities.suggestion_generator)),
            memory_update: Arc::new(MemoryUpdateNode::new(pool, capabilities.memory_updater)),
        };
        Self { runner, embedding, rerank }
    }

    /// Run both facades' lazy init up front so the first real request
    /// doesn't pay model-load latency inline.
    pub async fn warm_up(&self) -> Result<()> {
        self.embedding.ensure_initialized().await?;
        self.rerank.ensure_initialized().await?;
        Ok(())
    }

    pub fn embedding_progress(&self) -> GlobalProgress {
        self.embedding.progress()
    }

    pub fn rerank_progress(&self) -> GlobalProgress {
        self.rerank.progress()
    }

    /// Run one request to completion. Tokens, sources, and suggestions
    /// arrive via the request's callbacks during the call; the returned
    /// record carries the final accumulated state.
    pub async fn run_chat(&self, request: RunChatRequest) -> RunChatResponse {
        let mut state = ChatGraphState::new(request.run_id, request.question);
        state.conversation_key = request.conversation_key;
        state.sources = request.sources;
        state.tags = request.tags;
        state.document_intent = request.document_intent;

        let sinks = ChatSinks {
            on_token: request.on_token,
            on_sources: request.on_sources,
            on_suggestions: request.on_suggestions,
        };

        let final_state = self.runner.run(state, sinks).await;

        RunChatResponse {
            answer: final_state.answer,
            used_sources: final_state.used_sources.unwrap_or_default(),
            suggested_questions: final_state.suggested_questions,
            error: final_state.error,
        }
    }
}
