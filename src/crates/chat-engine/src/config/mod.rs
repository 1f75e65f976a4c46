//! Configuration for the chat engine: YAML loading (with `$include`
//! composition and `${VAR:default}` expansion) plus the one settings
//! document this engine actually needs.

pub mod loader;
pub mod settings;

pub use loader::{deep_merge, load_yaml_config, load_yaml_file};
pub use settings::{EngineSettings, RetrievalSettings, WorkerPoolSettings};
