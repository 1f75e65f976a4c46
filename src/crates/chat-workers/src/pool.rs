//! The worker pool: isolates heavy, blocking-ish ML calls (embedding init,
//! embedding, reranking, the document loader/splitter) from the request
//! loop behind a small set of long-lived background tasks.
//!
//! Shaped after the connection pool in the engine crate's WebSocket layer —
//! a `DashMap` keyed by a monotonic id, `AtomicU64` counters, `Arc` handles —
//! but here the map tracks in-flight *tasks* dispatched to a small number of
//! worker loops rather than client connections.

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::error::{Result, WorkerError};

/// The five task kinds a worker can execute, each with its own timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    LoadAndSplit,
    InitEmbedding,
    Embed,
    InitReranker,
    Rerank,
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::LoadAndSplit => "load_and_split",
            TaskKind::InitEmbedding => "init_embedding",
            TaskKind::Embed => "embed",
            TaskKind::InitReranker => "init_reranker",
            TaskKind::Rerank => "rerank",
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            TaskKind::LoadAndSplit => Duration::from_secs(300),
            _ => Duration::from_secs(60),
        }
    }
}

/// Reports `(loaded, total)` progress for a named file back to whoever
/// dispatched the task. Wired up to the `ProgressReporter` by the caller.
pub type ProgressCallback = Arc<dyn Fn(&str, u64, u64) + Send + Sync>;

/// The thing a worker actually runs. Implemented once per process by
/// whatever owns the real `EmbeddingModel` / `RerankModel` / document
/// loader; the pool only knows about task kinds and JSON payloads so it
/// stays oblivious to what those models are.
pub trait WorkerRuntime: Send + Sync + 'static {
    fn execute(
        &self,
        kind: TaskKind,
        payload: Value,
        progress: Option<ProgressCallback>,
    ) -> BoxFuture<'static, std::result::Result<Value, String>>;
}

/// Sentinel error string a `WorkerRuntime` can return to simulate the
/// worker process dying outright, distinct from an ordinary task failure.
/// A real out-of-process worker would instead be detected by the process
/// exiting or the IPC channel closing.
pub const CRASH_SENTINEL: &str = "__worker_crashed__";

struct Dispatch {
    kind: TaskKind,
    payload: Value,
    progress: Option<ProgressCallback>,
    resolve: oneshot::Sender<std::result::Result<Value, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct WorkerId(u64);

const PRIMARY: WorkerId = WorkerId(0);

struct WorkerHandle {
    sender: mpsc::Sender<Dispatch>,
    task: tokio::task::JoinHandle<()>,
    primary: bool,
}

/// Scheduling policy: one lazily-spawned primary worker; a scale-up worker
/// is added once more than this many tasks are pending and the pool is
/// still below `max_workers`; surplus workers are torn down once the queue
/// drains back to empty.
const SCALE_UP_PENDING_THRESHOLD: usize = 3;

pub struct WorkerPool {
    runtime: Arc<dyn WorkerRuntime>,
    workers: Arc<DashMap<WorkerId, WorkerHandle>>,
    pending: Arc<DashMap<u64, WorkerId>>,
    next_worker_id: AtomicU64,
    next_task_id: AtomicU64,
    max_workers: usize,
}

impl WorkerPool {
    pub fn new(runtime: Arc<dyn WorkerRuntime>) -> Self {
        Self::with_max_workers(runtime, num_cpus::get().clamp(1, 4))
    }

    /// Same as [`WorkerPool::new`] but with an explicit scale-up ceiling,
    /// e.g. from a deployment's worker-pool sizing setting.
    pub fn with_max_workers(runtime: Arc<dyn WorkerRuntime>, max_workers: usize) -> Self {
        Self {
            runtime,
            workers: Arc::new(DashMap::new()),
            pending: Arc::new(DashMap::new()),
            next_worker_id: AtomicU64::new(1),
            next_task_id: AtomicU64::new(0),
            max_workers: max_workers.max(1),
        }
    }

    /// Run one task to completion, spawning/scaling workers as needed and
    /// enforcing the per-kind timeout. Mirrors the wire contract: a task
    /// either resolves with its result payload or rejects with a timeout,
    /// an upstream error message, or "terminated" if the pool was shut down
    /// or its worker died mid-task.
    pub async fn dispatch(&self, kind: TaskKind, payload: Value, progress: Option<ProgressCallback>) -> Result<Value> {
        let worker_id = self.route_dispatch().await;
        let (resolve, receiver) = oneshot::channel();
        let task_id = self.next_task_id.fetch_add(1, Ordering::SeqCst);

        let sender = self
            .workers
            .get(&worker_id)
            .map(|w| w.sender.clone())
            .ok_or(WorkerError::Terminated)?;

        self.pending.insert(task_id, worker_id);
        let send_result = sender
            .send(Dispatch { kind, payload, progress, resolve })
            .await;
        if send_result.is_err() {
            self.pending.remove(&task_id);
            return Err(WorkerError::Terminated);
        }

        let outcome = tokio::time::timeout(kind.timeout(), receiver).await;
        self.pending.remove(&task_id);
        self.reap_idle_workers();

        match outcome {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(WorkerError::Upstream(message)),
            Ok(Err(_recv_error)) => Err(WorkerError::Terminated),
            Err(_elapsed) => {
                warn!(kind = kind.label(), "worker task timed out");
                Err(WorkerError::Timeout { kind: kind.label(), after: kind.timeout() })
            }
        }
    }

    /// Pick (and, if needed, spawn) the worker this dispatch goes to.
    async fn route_dispatch(&self) -> WorkerId {
        if !self.workers.contains_key(&PRIMARY) {
            self.spawn_worker(PRIMARY, true);
        }

        if self.pending.len() > SCALE_UP_PENDING_THRESHOLD && self.workers.len() < self.max_workers {
            let id = WorkerId(self.next_worker_id.fetch_add(1, Ordering::SeqCst));
            self.spawn_worker(id, false);
            return id;
        }

        // Route to whichever existing worker currently has the fewest
        // pending tasks; falls back to the primary if the map is empty.
        let mut counts: std::collections::HashMap<WorkerId, usize> = self
            .workers
            .iter()
            .map(|entry| (*entry.key(), 0usize))
            .collect();
        for entry in self.pending.iter() {
            *counts.entry(*entry.value()).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .min_by_key(|(_, count)| *count)
            .map(|(id, _)| id)
            .unwrap_or(PRIMARY)
    }

    fn spawn_worker(&self, id: WorkerId, primary: bool) {
        let (sender, receiver) = mpsc::channel(32);
        let runtime = Arc::clone(&self.runtime);
        let workers = Arc::clone(&self.workers);
        let task = tokio::spawn(run_worker(id, runtime, receiver, workers.clone()));
        self.workers.insert(id, WorkerHandle { sender, task, primary });
        info!(worker = id.0, primary, "worker spawned");
    }

    /// Once the queue is empty, drop every worker beyond the primary.
    fn reap_idle_workers(&self) {
        if !self.pending.is_empty() {
            return;
        }
        let surplus: Vec<WorkerId> = self
            .workers
            .iter()
            .filter(|entry| !entry.value().primary)
            .map(|entry| *entry.key())
            .collect();
        for id in surplus {
            if let Some((_, handle)) = self.workers.remove(&id) {
                handle.task.abort();
                debug!(worker = id.0, "idle worker reaped");
            }
        }
    }

    /// Shut the pool down: abort every worker task. Any dispatch still
    /// awaiting a response observes its oneshot receiver disconnect and
    /// resolves to `WorkerError::Terminated`.
    pub fn terminate(&self) {
        for entry in self.workers.iter() {
            entry.value().task.abort();
        }
        self.workers.clear();
        self.pending.clear();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.terminate();
    }
}

async fn run_worker(
    id: WorkerId,
    runtime: Arc<dyn WorkerRuntime>,
    mut receiver: mpsc::Receiver<Dispatch>,
    workers: Arc<DashMap<WorkerId, WorkerHandle>>,
) {
    while let Some(dispatch) = receiver.recv().await {
        let result = runtime.execute(dispatch.kind, dispatch.payload, dispatch.progress).await;

        if let Err(message) = &result {
            if message == CRASH_SENTINEL {
                error!(worker = id.0, "worker crashed");
                let _ = dispatch.resolve.send(Err(WorkerError::Crashed.to_string()));
                break;
            }
        }
        let _ = dispatch.resolve.send(result);
    }

    let was_primary = workers.get(&id).map(|w| w.primary).unwrap_or(false);
    workers.remove(&id);

    if was_primary {
        warn!(worker = id.0, "primary worker exited, respawning after backoff");
        tokio::time::sleep(Duration::from_secs(1)).await;
        let (sender, new_receiver) = mpsc::channel(32);
        let task = tokio::spawn(run_worker(PRIMARY, runtime, new_receiver, workers.clone()));
        workers.insert(PRIMARY, WorkerHandle { sender, task, primary: true });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct EchoRuntime {
        calls: AtomicUsize,
    }

    impl WorkerRuntime for EchoRuntime {
        fn execute(
            &self,
            _kind: TaskKind,
            payload: Value,
            _progress: Option<ProgressCallback>,
        ) -> BoxFuture<'static, std::result::Result<Value, String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(payload) })
        }
    }

    struct FailingRuntime;

    impl WorkerRuntime for FailingRuntime {
        fn execute(
            &self,
            _kind: TaskKind,
            _payload: Value,
            _progress: Option<ProgressCallback>,
        ) -> BoxFuture<'static, std::result::Result<Value, String>> {
            Box::pin(async move { Err("bad input".to_string()) })
        }
    }

    struct HangingRuntime;

    impl WorkerRuntime for HangingRuntime {
        fn execute(
            &self,
            _kind: TaskKind,
            _payload: Value,
            _progress: Option<ProgressCallback>,
        ) -> BoxFuture<'static, std::result::Result<Value, String>> {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Value::Null)
            })
        }
    }

    #[tokio::test]
    async fn dispatch_round_trips_the_payload() {
        let pool = WorkerPool::new(Arc::new(EchoRuntime { calls: AtomicUsize::new(0) }));
        let result = pool
            .dispatch(TaskKind::Embed, serde_json::json!({"texts": ["a"]}), None)
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"texts": ["a"]}));
    }

    #[tokio::test]
    async fn upstream_failure_surfaces_as_upstream_error() {
        let pool = WorkerPool::new(Arc::new(FailingRuntime));
        let err = pool.dispatch(TaskKind::Rerank, Value::Null, None).await.unwrap_err();
        assert!(matches!(err, WorkerError::Upstream(m) if m == "bad input"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fires_after_the_task_kind_budget() {
        let pool = WorkerPool::new(Arc::new(HangingRuntime));
        let handle = tokio::spawn(async move { pool.dispatch(TaskKind::Rerank, Value::Null, None).await });
        tokio::time::advance(Duration::from_secs(61)).await;
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, WorkerError::Timeout { kind: "rerank", .. }));
    }

    #[tokio::test]
    async fn with_max_workers_clamps_a_zero_setting_to_one() {
        let pool = WorkerPool::with_max_workers(Arc::new(EchoRuntime { calls: AtomicUsize::new(0) }), 0);
        assert_eq!(pool.max_workers, 1);
    }

    #[tokio::test]
    async fn terminate_rejects_in_flight_dispatches() {
        let pool = Arc::new(WorkerPool::new(Arc::new(HangingRuntime)));
        let dispatcher = pool.clone();
        let handle = tokio::spawn(async move { dispatcher.dispatch(TaskKind::Embed, Value::Null, None).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.terminate();
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, WorkerError::Terminated));
    }
}
