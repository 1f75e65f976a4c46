//! Embedding facade: wraps an `Arc<WorkerPool>` so every embed/rerank call
//! goes through a background worker instead of touching the model directly,
//! and so the expensive init task only ever runs once even when many
//! requests race to be first.
//!
//! The single-flight guard is a `tokio::sync::OnceCell`-shaped hand roll:
//! the first caller installs a shared, clonable future in a `Mutex`; every
//! later caller awaits that same future instead of calling `init` again.

use std::sync::Arc;
use tokio::sync::Mutex;

use chat_graph::{GraphError, Result};

use crate::pool::{TaskKind, WorkerPool};
use crate::progress::{GlobalProgress, ProgressReporter};
use crate::tasks::{EmbedPayload, EmbedResult, RerankPayload, RerankResult};

enum InitState {
    Idle,
    InFlight(Arc<tokio::sync::Notify>),
    Ready,
    Failed(String),
}

/// Guards a single lazily-initialized model behind one `init()` call,
/// sharing its outcome with every caller that arrived while it was running.
struct SingleFlightInit {
    state: Mutex<InitState>,
}

impl SingleFlightInit {
    fn new() -> Self {
        Self { state: Mutex::new(InitState::Idle) }
    }

    /// Ensure `init` has run exactly once, sharing the result with any
    /// caller that raced in while it was in flight. `init` is only invoked
    /// by whichever caller is first to observe `Idle`.
    async fn ensure<F, Fut>(&self, init: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        loop {
            let mut guard = self.state.lock().await;
            match &*guard {
                InitState::Ready => return Ok(()),
                InitState::Failed(message) => return Err(GraphError::Other(message.clone())),
                InitState::InFlight(notify) => {
                    let notify = Arc::clone(notify);
                    let notified = notify.notified();
                    tokio::pin!(notified);
                    // Register as a waiter before releasing the lock so a
                    // `notify_waiters` fired the instant we drop it can't
                    // be missed (Notify only wakes waiters already
                    // enabled at the time it's called).
                    notified.as_mut().enable();
                    drop(guard);
                    notified.await;
                    continue;
                }
                InitState::Idle => {
                    let notify = Arc::new(tokio::sync::Notify::new());
                    *guard = InitState::InFlight(Arc::clone(&notify));
                    drop(guard);

                    let outcome = init().await;

                    let mut guard = self.state.lock().await;
                    *guard = match &outcome {
                        Ok(()) => InitState::Ready,
                        Err(err) => InitState::Failed(err.to_string()),
                    };
                    drop(guard);
                    notify.notify_waiters();
                    return outcome;
                }
            }
        }
    }
}

fn worker_err(err: impl std::fmt::Display) -> GraphError {
    GraphError::Other(err.to_string())
}

pub struct EmbeddingFacade {
    pool: Arc<WorkerPool>,
    reporter: Arc<ProgressReporter>,
    init_guard: SingleFlightInit,
}

impl EmbeddingFacade {
    pub fn new(pool: Arc<WorkerPool>, reporter: Arc<ProgressReporter>) -> Self {
        Self { pool, reporter, init_guard: SingleFlightInit::new() }
    }

    pub async fn ensure_initialized(&self) -> Result<()> {
        let pool = Arc::clone(&self.pool);
        self.init_guard
            .ensure(|| async move {
                pool.dispatch(TaskKind::InitEmbedding, serde_json::Value::Null, None)
                    .await
                    .map(|_| ())
                    .map_err(worker_err)
            })
            .await
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.ensure_initialized().await?;

        let payload = serde_json::to_value(EmbedPayload { texts: texts.to_vec() }).map_err(worker_err)?;
        let response = self.pool.dispatch(TaskKind::Embed, payload, None).await.map_err(worker_err)?;
        let result: EmbedResult = serde_json::from_value(response).map_err(worker_err)?;
        Ok(result.vectors)
    }

    /// The last-computed model-load progress, for a caller polling status
    /// outside the `init()` call itself (e.g. a startup health check).
    pub fn progress(&self) -> GlobalProgress {
        self.reporter.snapshot()
    }
}

pub struct RerankFacade {
    pool: Arc<WorkerPool>,
    reporter: Arc<ProgressReporter>,
    init_guard: SingleFlightInit,
}

impl RerankFacade {
    pub fn new(pool: Arc<WorkerPool>, reporter: Arc<ProgressReporter>) -> Self {
        Self { pool, reporter, init_guard: SingleFlightInit::new() }
    }

    pub async fn ensure_initialized(&self) -> Result<()> {
        let pool = Arc::clone(&self.pool);
        self.init_guard
            .ensure(|| async move {
                pool.dispatch(TaskKind::InitReranker, serde_json::Value::Null, None)
                    .await
                    .map(|_| ())
                    .map_err(worker_err)
            })
            .await
    }

    pub async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        self.ensure_initialized().await?;

        let payload = serde_json::to_value(RerankPayload { query: query.to_string(), documents: documents.to_vec() })
            .map_err(worker_err)?;
        let response = self.pool.dispatch(TaskKind::Rerank, payload, None).await.map_err(worker_err)?;
        let result: RerankResult = serde_json::from_value(response).map_err(worker_err)?;
        Ok(result.scores)
    }

    pub fn progress(&self) -> GlobalProgress {
        self.reporter.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ModelWorkerRuntime;
    use async_trait::async_trait;
    use chat_graph::llm::{EmbeddingModel, ProgressSink, RerankModel};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingModel {
        init_calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingModel for CountingModel {
        async fn init(&self, _progress: &dyn ProgressSink) -> Result<()> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            Ok(())
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0]).collect())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl EmbeddingModel for FailingModel {
        async fn init(&self, _progress: &dyn ProgressSink) -> Result<()> {
            Err(GraphError::Other("boom".into()))
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            unreachable!("init should fail first")
        }
    }

    struct NullRerank;

    #[async_trait]
    impl RerankModel for NullRerank {
        async fn init(&self, _progress: &dyn ProgressSink) -> Result<()> {
            Ok(())
        }

        async fn rerank(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>> {
            Ok(vec![0.0; documents.len()])
        }
    }

    struct NullEmbedding;

    #[async_trait]
    impl EmbeddingModel for NullEmbedding {
        async fn init(&self, _progress: &dyn ProgressSink) -> Result<()> {
            Ok(())
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0]).collect())
        }
    }

    struct EchoRerank;

    #[async_trait]
    impl RerankModel for EchoRerank {
        async fn init(&self, _progress: &dyn ProgressSink) -> Result<()> {
            Ok(())
        }

        async fn rerank(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>> {
            Ok(documents.iter().map(|d| d.len() as f32).collect())
        }
    }

    fn embedding_facade(model: Arc<dyn EmbeddingModel>) -> EmbeddingFacade {
        let reporter = Arc::new(ProgressReporter::new());
        let runtime =
            ModelWorkerRuntime::new(model, Arc::new(NullRerank), Arc::clone(&reporter), Arc::new(ProgressReporter::new()));
        let pool = Arc::new(WorkerPool::new(Arc::new(runtime)));
        EmbeddingFacade::new(pool, reporter)
    }

    fn rerank_facade(model: Arc<dyn RerankModel>) -> RerankFacade {
        let reporter = Arc::new(ProgressReporter::new());
        let runtime =
            ModelWorkerRuntime::new(Arc::new(NullEmbedding), model, Arc::new(ProgressReporter::new()), Arc::clone(&reporter));
        let pool = Arc::new(WorkerPool::new(Arc::new(runtime)));
        RerankFacade::new(pool, reporter)
    }

    #[tokio::test]
    async fn concurrent_embed_calls_initialize_exactly_once() {
        let model = Arc::new(CountingModel { init_calls: AtomicUsize::new(0) });
        let facade = Arc::new(embedding_facade(model.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let facade = Arc::clone(&facade);
            handles.push(tokio::spawn(async move { facade.embed(&["hi".to_string()]).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(model.init_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_failed_init_is_remembered_for_later_callers() {
        let facade = embedding_facade(Arc::new(FailingModel));
        assert!(facade.ensure_initialized().await.is_err());
        assert!(facade.ensure_initialized().await.is_err());
    }

    #[tokio::test]
    async fn embed_dispatches_through_the_pool_and_round_trips_vectors() {
        let facade = embedding_facade(Arc::new(NullEmbedding));
        let vectors = facade.embed(&["a".into(), "b".into()]).await.unwrap();
        assert_eq!(vectors.len(), 2);
    }

    #[tokio::test]
    async fn rerank_dispatches_through_the_pool_and_round_trips_scores() {
        let facade = rerank_facade(Arc::new(EchoRerank));
        let scores = facade.rerank("q", &["a".into(), "bb".into()]).await.unwrap();
        assert_eq!(scores, vec![1.0, 2.0]);
    }

    struct ReportingModel;

    #[async_trait]
    impl EmbeddingModel for ReportingModel {
        async fn init(&self, progress: &dyn ProgressSink) -> Result<()> {
            progress.on_progress("model.bin", 50, 100);
            progress.on_complete("model.bin");
            Ok(())
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0]).collect())
        }
    }

    #[tokio::test]
    async fn progress_reflects_init_events_dispatched_through_the_pool() {
        let facade = embedding_facade(Arc::new(ReportingModel));
        assert_eq!(facade.progress().percent, 0);

        facade.ensure_initialized().await.unwrap();
        assert_eq!(facade.progress().percent, 99);
    }
}
