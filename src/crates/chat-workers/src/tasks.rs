//! Wire payload shapes for the task kinds `ModelWorkerRuntime` executes.
//! Each one is just the JSON-shaped argument/result pair `WorkerPool::dispatch`
//! carries for that `TaskKind`; kept separate from `runtime.rs` since the
//! facades on the dispatching side need the same shapes to encode/decode.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct EmbedPayload {
    pub texts: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmbedResult {
    pub vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RerankPayload {
    pub query: String,
    pub documents: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RerankResult {
    pub scores: Vec<f32>,
}
