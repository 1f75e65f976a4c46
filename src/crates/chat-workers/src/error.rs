use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum WorkerError {
    #[error("worker task '{kind}' timed out after {after:?}")]
    Timeout { kind: &'static str, after: Duration },

    #[error("worker crashed before completing the task")]
    Crashed,

    #[error("worker terminated")]
    Terminated,

    #[error("{0}")]
    Upstream(String),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
