//! The one `WorkerRuntime` implementation this crate ships: owns the real
//! `EmbeddingModel`/`RerankModel` and decodes/encodes the JSON payloads the
//! pool carries per `TaskKind`, reporting model-load progress through the
//! same `ProgressReporter` the owning facade reads back through
//! `ProgressReporter::snapshot`.
//!
//! `TaskKind::LoadAndSplit` is part of the pool's task vocabulary but has no
//! document loader wired up here; dispatching it against this runtime fails
//! with an upstream error rather than panicking.

use std::sync::Arc;

use chat_graph::llm::{EmbeddingModel, ProgressSink, RerankModel};
use futures::future::BoxFuture;
use serde_json::Value;

use crate::pool::{ProgressCallback, TaskKind, WorkerRuntime};
use crate::progress::ProgressReporter;
use crate::tasks::{EmbedPayload, EmbedResult, RerankPayload, RerankResult};

pub struct ModelWorkerRuntime {
    embedding_model: Arc<dyn EmbeddingModel>,
    rerank_model: Arc<dyn RerankModel>,
    embedding_reporter: Arc<ProgressReporter>,
    rerank_reporter: Arc<ProgressReporter>,
}

impl ModelWorkerRuntime {
    pub fn new(
        embedding_model: Arc<dyn EmbeddingModel>,
        rerank_model: Arc<dyn RerankModel>,
        embedding_reporter: Arc<ProgressReporter>,
        rerank_reporter: Arc<ProgressReporter>,
    ) -> Self {
        Self { embedding_model, rerank_model, embedding_reporter, rerank_reporter }
    }
}

impl WorkerRuntime for ModelWorkerRuntime {
    fn execute(
        &self,
        kind: TaskKind,
        payload: Value,
        _progress: Option<ProgressCallback>,
    ) -> BoxFuture<'static, std::result::Result<Value, String>> {
        let embedding_model = Arc::clone(&self.embedding_model);
        let rerank_model = Arc::clone(&self.rerank_model);
        let embedding_reporter = Arc::clone(&self.embedding_reporter);
        let rerank_reporter = Arc::clone(&self.rerank_reporter);

        Box::pin(async move {
            match kind {
                TaskKind::InitEmbedding => embedding_model
                    .init(embedding_reporter.as_ref() as &dyn ProgressSink)
                    .await
                    .map(|_| Value::Null)
                    .map_err(|err| err.to_string()),
                TaskKind::Embed => {
                    let payload: EmbedPayload = serde_json::from_value(payload).map_err(|err| err.to_string())?;
                    let vectors = embedding_model.embed(&payload.texts).await.map_err(|err| err.to_string())?;
                    serde_json::to_value(EmbedResult { vectors }).map_err(|err| err.to_string())
                }
                TaskKind::InitReranker => rerank_model
                    .init(rerank_reporter.as_ref() as &dyn ProgressSink)
                    .await
                    .map(|_| Value::Null)
                    .map_err(|err| err.to_string()),
                TaskKind::Rerank => {
                    let payload: RerankPayload = serde_json::from_value(payload).map_err(|err| err.to_string())?;
                    let scores = rerank_model
                        .rerank(&payload.query, &payload.documents)
                        .await
                        .map_err(|err| err.to_string())?;
                    serde_json::to_value(RerankResult { scores }).map_err(|err| err.to_string())
                }
                TaskKind::LoadAndSplit => {
                    Err("ModelWorkerRuntime has no document loader wired up for load_and_split".to_string())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedding {
        init_calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingModel for CountingEmbedding {
        async fn init(&self, _progress: &dyn ProgressSink) -> chat_graph::Result<()> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn embed(&self, texts: &[String]) -> chat_graph::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    struct EchoRerank;

    #[async_trait]
    impl RerankModel for EchoRerank {
        async fn init(&self, _progress: &dyn ProgressSink) -> chat_graph::Result<()> {
            Ok(())
        }

        async fn rerank(&self, _query: &str, documents: &[String]) -> chat_graph::Result<Vec<f32>> {
            Ok(documents.iter().map(|d| d.len() as f32).collect())
        }
    }

    fn runtime() -> ModelWorkerRuntime {
        ModelWorkerRuntime::new(
            Arc::new(CountingEmbedding { init_calls: AtomicUsize::new(0) }),
            Arc::new(EchoRerank),
            Arc::new(ProgressReporter::new()),
            Arc::new(ProgressReporter::new()),
        )
    }

    #[tokio::test]
    async fn embed_task_round_trips_vectors() {
        let runtime = runtime();
        let payload = serde_json::to_value(EmbedPayload { texts: vec!["ab".into(), "abc".into()] }).unwrap();
        let result = runtime.execute(TaskKind::Embed, payload, None).await.unwrap();
        let result: EmbedResult = serde_json::from_value(result).unwrap();
        assert_eq!(result.vectors, vec![vec![2.0], vec![3.0]]);
    }

    #[tokio::test]
    async fn rerank_task_round_trips_scores() {
        let runtime = runtime();
        let payload =
            serde_json::to_value(RerankPayload { query: "q".into(), documents: vec!["a".into(), "bb".into()] })
                .unwrap();
        let result = runtime.execute(TaskKind::Rerank, payload, None).await.unwrap();
        let result: RerankResult = serde_json::from_value(result).unwrap();
        assert_eq!(result.scores, vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn load_and_split_is_not_supported() {
        let runtime = runtime();
        let err = runtime.execute(TaskKind::LoadAndSplit, Value::Null, None).await.unwrap_err();
        assert!(err.contains("load_and_split"));
    }
}
