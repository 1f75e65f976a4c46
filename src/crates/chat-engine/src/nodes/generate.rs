//! `generate`: the streaming-answer stage, with a delegated
//! Map-Reduce path for long-context analysis questions and the citation-
//! retry re-entry the grounding-check loop drives.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chat_graph::llm::{ChatModel, ChatRequest};
use chat_graph::{ChatGraphState, ChatSinks, GraphError, GraphNode, GroundingStatus, MessageRole, Result, StatePatch};
use futures::StreamExt;
use serde_json::Value;

use crate::context::{ContextManager, ContextUsage};
use crate::mapreduce::{AnalysisType, AnalyzeOptions, LongContextAnalyzer};

const LONG_CONTEXT_THRESHOLD: usize = 8000;
const SIMULATED_STREAM_CHUNK: usize = 20;
const SIMULATED_STREAM_DELAY: Duration = Duration::from_millis(10);

pub struct GenerateNode {
    model: Arc<dyn ChatModel>,
    analyzer: LongContextAnalyzer,
    model_name: String,
}

impl GenerateNode {
    pub fn new(model: Arc<dyn ChatModel>, model_name: impl Into<String>) -> Self {
        let analyzer = LongContextAnalyzer::new(Arc::clone(&model));
        Self { model, analyzer, model_name: model_name.into() }
    }

    fn is_regeneration(state: &ChatGraphState) -> bool {
        state.answer.is_some() && state.grounding_status == Some(GroundingStatus::InvalidCitations)
    }

    async fn emit_simulated_stream(sinks: &ChatSinks, text: &str) {
        let chars: Vec<char> = text.chars().collect();
        for window in chars.chunks(SIMULATED_STREAM_CHUNK) {
            sinks.emit_token(window.iter().collect());
            tokio::time::sleep(SIMULATED_STREAM_DELAY).await;
        }
    }

    /// Budgets this turn's rendered system prompt (instructions + memory +
    /// retrieved context) against the deployed model's context window. A
    /// fresh, short-lived `ContextManager` is cheap to build per call and
    /// keeps one request's accounting from bleeding into another's.
    ///
    /// A request that doesn't fit loses its whole system message first,
    /// since `ContextTrimmer`'s priority strategy ranks `System` above
    /// everything else and there is nothing left to drop piecemeal once it
    /// goes — the returned request keeps only the question in that case.
    async fn fit_to_context_window(&self, request: ChatRequest) -> (ChatRequest, HashMap<String, Value>) {
        let manager = ContextManager::new(self.model_name.clone());
        manager.add_messages(request.as_messages()).await;

        let usage = manager.get_usage().await;
        let metrics = usage_metrics(&usage);

        if !usage.is_approaching_limit() {
            return (request, metrics);
        }

        let fits = manager.get_messages().await.iter().any(|m| m.role == MessageRole::System);
        if fits {
            (request, metrics)
        } else {
            (ChatRequest::new(request.question).with_global_search(request.is_global_search), metrics)
        }
    }
}

fn usage_metrics(usage: &ContextUsage) -> HashMap<String, Value> {
    HashMap::from([
        ("context_tokens_used".to_string(), Value::from(usage.used)),
        ("context_window_percentage".to_string(), Value::from(usage.percentage)),
        ("context_warning_level".to_string(), Value::from(format!("{:?}", usage.warning_level))),
    ])
}

#[async_trait]
impl GraphNode for GenerateNode {
    fn name(&self) -> &'static str {
        "generate"
    }

    async fn run(&self, state: &ChatGraphState, sinks: &ChatSinks) -> Result<StatePatch> {
        if state.error.is_some() {
            return Ok(StatePatch::empty());
        }
        let regenerating = Self::is_regeneration(state);
        if state.answer.is_some() && !regenerating {
            return Ok(StatePatch::empty());
        }

        let context_len = state.context.as_deref().map(str::len).unwrap_or(0);
        if state.analysis_intent == Some(true) && context_len > LONG_CONTEXT_THRESHOLD {
            let text = state.context.clone().unwrap_or_default();
            let analysis = self
                .analyzer
                .analyze(&text, AnalyzeOptions { analysis_type: AnalysisType::Comprehensive, max_chunks: 10 })
                .await
                .map_err(|err| GraphError::Other(err.to_string()))?;

            Self::emit_simulated_stream(sinks, &analysis).await;

            return Ok(StatePatch {
                answer: Some(analysis),
                retry_count: regenerating.then_some(state.retry_count + 1),
                ..StatePatch::empty()
            });
        }

        let request = ChatRequest::new(state.effective_question())
            .with_context(state.context.clone().unwrap_or_default())
            .with_global_search(state.is_global_search.unwrap_or(false));
        let request = match &state.memory {
            Some(memory) => request.with_memory(memory.clone()),
            None => request,
        };
        let (request, usage_metrics) = self.fit_to_context_window(request).await;

        let mut context_metrics = state.context_metrics.clone().unwrap_or_default();
        context_metrics.extend(usage_metrics);

        let mut stream = self.model.stream(request).await?;
        let mut answer = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            sinks.emit_token(chunk.clone());
            answer.push_str(&chunk);
        }

        Ok(StatePatch {
            answer: Some(answer),
            context_metrics: Some(context_metrics),
            retry_count: regenerating.then_some(state.retry_count + 1),
            ..StatePatch::empty()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chat_graph::llm::ChatTokenStream;
    use futures::stream;

    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn stream(&self, request: ChatRequest) -> chat_graph::Result<ChatTokenStream> {
            let chunks = vec![Ok(format!("answering: {}", request.question))];
            Ok(Box::pin(stream::iter(chunks)))
        }

        async fn complete(&self, prompt: &str) -> chat_graph::Result<String> {
            Ok(format!("analysis-of[{}]", prompt.len()))
        }
    }

    #[tokio::test]
    async fn skips_when_error_already_set() {
        let node = GenerateNode::new(Arc::new(EchoModel), "gpt-4");
        let mut state = ChatGraphState::new("run-1", "hello");
        state.error = Some("retrieval_failed".into());
        let patch = node.run(&state, &ChatSinks::default()).await.unwrap();
        assert!(patch.answer.is_none());
    }

    #[tokio::test]
    async fn skips_when_answer_present_and_not_regenerating() {
        let node = GenerateNode::new(Arc::new(EchoModel), "gpt-4");
        let mut state = ChatGraphState::new("run-1", "hello");
        state.answer = Some("already answered".into());
        let patch = node.run(&state, &ChatSinks::default()).await.unwrap();
        assert!(patch.answer.is_none());
    }

    #[tokio::test]
    async fn streams_and_accumulates_answer() {
        let node = GenerateNode::new(Arc::new(EchoModel), "gpt-4");
        let state = ChatGraphState::new("run-1", "hello");
        let patch = node.run(&state, &ChatSinks::default()).await.unwrap();
        assert_eq!(patch.answer.as_deref(), Some("answering: hello"));
        assert!(patch.retry_count.is_none());
    }

    #[tokio::test]
    async fn regeneration_increments_retry_count() {
        let node = GenerateNode::new(Arc::new(EchoModel), "gpt-4");
        let mut state = ChatGraphState::new("run-1", "hello");
        state.answer = Some("See [5]".into());
        state.grounding_status = Some(GroundingStatus::InvalidCitations);
        state.retry_count = 0;
        let patch = node.run(&state, &ChatSinks::default()).await.unwrap();
        assert_eq!(patch.retry_count, Some(1));
    }

    struct SpyModel {
        last_context: std::sync::Mutex<Option<String>>,
    }

    #[async_trait]
    impl ChatModel for SpyModel {
        async fn stream(&self, request: ChatRequest) -> chat_graph::Result<ChatTokenStream> {
            *self.last_context.lock().unwrap() = request.context.clone();
            Ok(Box::pin(stream::iter(vec![Ok("ok".to_string())])))
        }

        async fn complete(&self, prompt: &str) -> chat_graph::Result<String> {
            Ok(prompt.to_string())
        }
    }

    #[tokio::test]
    async fn small_context_is_kept_and_usage_metrics_recorded() {
        let model = Arc::new(SpyModel { last_context: std::sync::Mutex::new(None) });
        let node = GenerateNode::new(model.clone(), "gpt-4");
        let mut state = ChatGraphState::new("run-1", "hello");
        state.context = Some("short context".into());

        let patch = node.run(&state, &ChatSinks::default()).await.unwrap();

        assert_eq!(model.last_context.lock().unwrap().as_deref(), Some("short context"));
        let metrics = patch.context_metrics.unwrap();
        assert!(metrics.contains_key("context_tokens_used"));
    }

    #[tokio::test]
    async fn oversized_context_is_dropped_to_respect_the_context_window() {
        let model = Arc::new(SpyModel { last_context: std::sync::Mutex::new(None) });
        let node = GenerateNode::new(model.clone(), "gpt-4");
        let mut state = ChatGraphState::new("run-1", "hello");
        state.context = Some("x".repeat(100_000));

        node.run(&state, &ChatSinks::default()).await.unwrap();

        assert!(model.last_context.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn existing_retrieval_metrics_are_preserved_alongside_usage_metrics() {
        let model = Arc::new(SpyModel { last_context: std::sync::Mutex::new(None) });
        let node = GenerateNode::new(model, "gpt-4");
        let mut state = ChatGraphState::new("run-1", "hello");
        state.context_metrics = Some(HashMap::from([("retrieval_hits".to_string(), Value::from(3))]));

        let patch = node.run(&state, &ChatSinks::default()).await.unwrap();

        let metrics = patch.context_metrics.unwrap();
        assert_eq!(metrics.get("retrieval_hits"), Some(&Value::from(3)));
        assert!(metrics.contains_key("context_tokens_used"));
    }
}
