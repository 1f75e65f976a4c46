//! The settings document this engine loads at startup: retrieval/search
//! switches, worker pool sizing, and the database connection string.
//! Everything the graph itself needs (prompts, timeouts, thresholds) is a
//! constant, not a setting — only the handful of genuinely deployment-
//! specific knobs live here.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::loader;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    #[serde(default)]
    pub web_search_enabled: bool,
    #[serde(default = "default_translation_target")]
    pub translation_target_language: String,
}

fn default_translation_target() -> String {
    "zh".to_string()
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            web_search_enabled: false,
            translation_target_language: default_translation_target(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolSettings {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_max_workers() -> usize {
    4
}

impl Default for WorkerPoolSettings {
    fn default() -> Self {
        Self { max_workers: default_max_workers() }
    }
}

fn default_chat_model_name() -> String {
    "gpt-4".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub worker_pool: WorkerPoolSettings,
    /// Identifies the deployed chat model so `ContextManager` can size its
    /// context window correctly (see `ContextLimits::for_model`).
    #[serde(default = "default_chat_model_name")]
    pub chat_model_name: String,
    pub database_url: String,
}

impl EngineSettings {
    /// Load settings from a YAML file, resolving `$include` directives and
    /// `${VAR:default}` environment expansion.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        loader::load_yaml_config(path).map_err(|err| EngineError::Config(err.to_string()))
    }
}
