//! `retrieve`: hybrid retrieval — local RAG, optionally
//! augmented with a web search when `searchIntent` is set — with an
//! empty-index short-circuit and an immediate out-of-band `onSources` fire.

use std::sync::Arc;

use async_trait::async_trait;
use chat_graph::{ChatGraphState, ChatSinks, ChatSource, GraphError, GraphNode, Result, SourceType, StatePatch};
use tooling::async_utils::retry::{with_retry, RetryPolicy};
use tracing::warn;

use crate::capabilities::{LocalRetriever, WebSearcher};

/// Web search is the one external-network hop in this node; the local
/// retriever runs against the in-process worker pool, which has its own
/// crash/backoff handling and needs none of this.
fn web_search_retry_policy() -> RetryPolicy {
    RetryPolicy::new(2).with_initial_interval(0.2).with_max_interval(2.0)
}

pub struct RetrieveNode {
    local_retriever: Arc<dyn LocalRetriever>,
    web_searcher: Arc<dyn WebSearcher>,
}

impl RetrieveNode {
    pub fn new(local_retriever: Arc<dyn LocalRetriever>, web_searcher: Arc<dyn WebSearcher>) -> Self {
        Self { local_retriever, web_searcher }
    }
}

#[async_trait]
impl GraphNode for RetrieveNode {
    fn name(&self) -> &'static str {
        "retrieve"
    }

    async fn run(&self, state: &ChatGraphState, sinks: &ChatSinks) -> Result<StatePatch> {
        if state.error.is_some() {
            return Ok(StatePatch::empty());
        }

        let query = state.effective_question();
        let sources_filter = state.sources.as_deref();
        let tags_filter = state.tags.as_deref();

        let local = self
            .local_retriever
            .retrieve(query, sources_filter, tags_filter)
            .await
            .map_err(|err| GraphError::Other(err.to_string()))?;

        let mut context = local.context.clone();
        let mut used_sources = local.sources.clone();

        if state.search_intent == Some(true) {
            let policy = web_search_retry_policy();
            match with_retry(&policy, || self.web_searcher.search(query)).await {
                Ok(hits) if !hits.is_empty() => {
                    let web_section: String = hits
                        .iter()
                        .map(|hit| format!("{}\n{}\n{}", hit.title, hit.url, hit.snippet))
                        .collect::<Vec<_>>()
                        .join("\n\n");
                    context = format!("[本地知识库]:\n{context}\n\n[互联网搜索结果]:\n{web_section}");
                    used_sources.extend(hits.into_iter().map(|hit| ChatSource {
                        content: hit.snippet,
                        file_name: hit.title,
                        file_path: hit.url.clone(),
                        url: Some(hit.url),
                        score: 0.9,
                        file_type: "url".to_string(),
                        source_type: SourceType::Url,
                        site_name: hit.site_name,
                    }));
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "retrieve: web search failed, continuing with local context only");
                }
            }
        }

        if local.context.is_empty() {
            if let Some(message) = local.empty_index_message {
                if let Some(cb) = &sinks.on_sources {
                    cb(Vec::new());
                }
                return Ok(StatePatch {
                    answer: Some(message),
                    used_sources: Some(Vec::new()),
                    context: Some(String::new()),
                    is_global_search: Some(local.is_global_search),
                    context_metrics: Some(local.metrics),
                    ..StatePatch::empty()
                });
            }
        }

        if !used_sources.is_empty() {
            if let Some(cb) = &sinks.on_sources {
                cb(used_sources.clone());
            }
        }

        Ok(StatePatch {
            context: Some(context),
            used_sources: Some(used_sources),
            is_global_search: Some(local.is_global_search),
            context_metrics: Some(local.metrics),
            ..StatePatch::empty()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{LocalRetrievalResult, WebHit};
    use crate::error::Result as EngineResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeLocalRetriever(LocalRetrievalResult);

    #[async_trait]
    impl LocalRetriever for FakeLocalRetriever {
        async fn retrieve(
            &self,
            _query: &str,
            _sources: Option<&[String]>,
            _tags: Option<&[String]>,
        ) -> EngineResult<LocalRetrievalResult> {
            Ok(self.0.clone())
        }
    }

    struct NoWebSearch;

    #[async_trait]
    impl WebSearcher for NoWebSearch {
        async fn search(&self, _query: &str) -> EngineResult<Vec<WebHit>> {
            Ok(Vec::new())
        }
    }

    struct FakeWebSearch(Vec<WebHit>);

    #[async_trait]
    impl WebSearcher for FakeWebSearch {
        async fn search(&self, _query: &str) -> EngineResult<Vec<WebHit>> {
            Ok(self.0.clone())
        }
    }

    struct FlakyWebSearch {
        hits: Vec<WebHit>,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl WebSearcher for FlakyWebSearch {
        async fn search(&self, _query: &str) -> EngineResult<Vec<WebHit>> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(crate::error::EngineError::General("connection timeout".into()));
            }
            Ok(self.hits.clone())
        }
    }

    fn local_result(context: &str) -> LocalRetrievalResult {
        LocalRetrievalResult {
            context: context.to_string(),
            sources: vec![ChatSource {
                content: "chunk".into(),
                file_name: "a.pdf".into(),
                file_path: "/kb/a.pdf".into(),
                url: None,
                score: 0.8,
                file_type: "pdf".into(),
                source_type: SourceType::File,
                site_name: None,
            }],
            is_global_search: false,
            metrics: Default::default(),
            empty_index_message: None,
        }
    }

    #[tokio::test]
    async fn local_only_retrieval_fires_on_sources_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls_clone = Arc::clone(&calls);
        let seen_clone = Arc::clone(&seen);

        let node = RetrieveNode::new(Arc::new(FakeLocalRetriever(local_result("evidence"))), Arc::new(NoWebSearch));
        let mut sinks = ChatSinks::default();
        sinks.on_sources = Some(Arc::new(move |sources: Vec<ChatSource>| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            *seen_clone.lock().unwrap() = sources;
        }));

        let state = ChatGraphState::new("run-1", "hello");
        let patch = node.run(&state, &sinks).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(patch.context.as_deref(), Some("evidence"));
    }

    #[tokio::test]
    async fn empty_index_short_circuits_to_answer() {
        let mut result = local_result("");
        result.context = String::new();
        result.sources = Vec::new();
        result.empty_index_message = Some("知识库为空".to_string());

        let node = RetrieveNode::new(Arc::new(FakeLocalRetriever(result)), Arc::new(NoWebSearch));
        let state = ChatGraphState::new("run-1", "hello");
        let patch = node.run(&state, &ChatSinks::default()).await.unwrap();

        assert_eq!(patch.answer.as_deref(), Some("知识库为空"));
        assert_eq!(patch.used_sources.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn web_augmentation_appends_section_and_url_sources() {
        let hits = vec![WebHit {
            title: "Example".into(),
            url: "https://example.com".into(),
            snippet: "snippet text".into(),
            site_name: Some("example.com".into()),
        }];
        let node = RetrieveNode::new(Arc::new(FakeLocalRetriever(local_result("local evidence"))), Arc::new(FakeWebSearch(hits)));

        let mut state = ChatGraphState::new("run-1", "hello");
        state.search_intent = Some(true);
        let patch = node.run(&state, &ChatSinks::default()).await.unwrap();

        let context = patch.context.unwrap();
        assert!(context.starts_with("[本地知识库]:"));
        assert!(context.contains("[互联网搜索结果]:"));

        let used_sources = patch.used_sources.unwrap();
        assert_eq!(used_sources.len(), 2);
        let web_source = used_sources.last().unwrap();
        assert_eq!(web_source.score, 0.9);
        assert_eq!(web_source.source_type, SourceType::Url);
    }

    #[tokio::test]
    async fn web_search_retries_once_after_a_transient_failure() {
        let hits = vec![WebHit {
            title: "Example".into(),
            url: "https://example.com".into(),
            snippet: "snippet text".into(),
            site_name: None,
        }];
        let web_searcher = FlakyWebSearch { hits, attempts: AtomicUsize::new(0) };
        let node = RetrieveNode::new(Arc::new(FakeLocalRetriever(local_result("local evidence"))), Arc::new(web_searcher));

        let mut state = ChatGraphState::new("run-1", "hello");
        state.search_intent = Some(true);
        let patch = node.run(&state, &ChatSinks::default()).await.unwrap();

        assert_eq!(patch.used_sources.unwrap().len(), 2);
    }
}
