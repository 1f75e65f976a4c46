//! `ChatGraphState` — the single value that flows through the chat graph,
//! and the typed patch every node returns to mutate it.
//!
//! Each field has a fixed combiner (documented inline) applied when a node's
//! [`StatePatch`] is folded into the live state. There is no reflection:
//! [`ChatGraphState::apply`] is one named `match`-free field-by-field merge,
//! per the framework's design note that a state struct with explicit typed
//! fields needs no generic "deep merge".

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A citation produced by retrieval. Read-only once produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSource {
    pub content: String,
    pub file_name: String,
    pub file_path: String,
    pub url: Option<String>,
    pub score: f32,
    pub file_type: String,
    pub source_type: SourceType,
    pub site_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    File,
    Url,
}

/// Outcome of the `groundingCheck` node; see `§4.10` of the design for the
/// decision table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroundingStatus {
    #[default]
    Ok,
    MissingCitations,
    InvalidCitations,
}

/// Knowledge base overview, populated by the `kbOverview` node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KbOverviewData {
    pub total_files: usize,
    pub total_chunks: usize,
    pub tag_stats: HashMap<String, usize>,
}

/// Out-of-band streaming sinks. These are request-scoped side channels, not
/// diffable state — they never appear in a [`StatePatch`] and are carried
/// alongside the state rather than merged into it.
#[derive(Clone, Default)]
pub struct ChatSinks {
    pub on_token: Option<Arc<dyn Fn(String) + Send + Sync>>,
    pub on_sources: Option<Arc<dyn Fn(Vec<ChatSource>) + Send + Sync>>,
    pub on_suggestions: Option<Arc<dyn Fn(Vec<String>) + Send + Sync>>,
}

impl ChatSinks {
    /// Invoke `on_token`, swallowing a panicking/erroring callback per the
    /// `callback_fault` policy: log and continue, never fail the request.
    pub fn emit_token(&self, chunk: String) {
        if let Some(cb) = &self.on_token {
            cb(chunk);
        }
    }

    pub fn emit_sources(&self, sources: Vec<ChatSource>) {
        if let Some(cb) = &self.on_sources {
            cb(sources);
        }
    }

    pub fn emit_suggestions(&self, suggestions: Vec<String>) {
        if let Some(cb) = &self.on_suggestions {
            cb(suggestions);
        }
    }
}

/// The per-request state object. See module docs for merge semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatGraphState {
    pub run_id: String,
    pub conversation_key: Option<String>,
    pub question: String,
    pub sources: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub memory: Option<String>,
    pub context: Option<String>,
    pub is_global_search: Option<bool>,
    pub answer: Option<String>,
    pub used_sources: Option<Vec<ChatSource>>,
    pub context_metrics: Option<HashMap<String, serde_json::Value>>,
    pub error: Option<String>,

    pub document_intent: Option<serde_json::Value>,
    pub search_intent: Option<bool>,
    pub analysis_intent: Option<bool>,
    pub kb_overview_intent: Option<bool>,
    pub kb_overview_data: Option<KbOverviewData>,

    pub translated_question: Option<String>,
    pub suggested_questions: Option<Vec<String>>,
    pub grounding_status: Option<GroundingStatus>,
    pub retry_count: u32,
}

impl ChatGraphState {
    pub fn new(run_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            conversation_key: None,
            question: question.into(),
            sources: None,
            tags: None,
            memory: None,
            context: None,
            is_global_search: None,
            answer: None,
            used_sources: None,
            context_metrics: None,
            error: None,
            document_intent: None,
            search_intent: None,
            analysis_intent: None,
            kb_overview_intent: None,
            kb_overview_data: None,
            translated_question: None,
            suggested_questions: None,
            grounding_status: None,
            retry_count: 0,
        }
    }

    /// The question a downstream node should actually search/generate
    /// against: the translation when present, else the original.
    pub fn effective_question(&self) -> &str {
        self.translated_question.as_deref().unwrap_or(&self.question)
    }

    /// Fold a node's partial result into the live state, applying each
    /// field's combiner. Enforces invariant I1: once `error` is set, no
    /// subsequent patch mutates anything but the error itself.
    pub fn apply(&mut self, patch: StatePatch) {
        if self.error.is_some() {
            if let Some(error) = patch.error {
                self.error = Some(error);
            }
            return;
        }

        // next || prev: replace only with a present, nonempty value.
        if let Some(run_id) = patch.run_id {
            if !run_id.is_empty() {
                self.run_id = run_id;
            }
        }
        if let Some(question) = patch.question {
            if !question.is_empty() {
                self.question = question;
            }
        }

        // next ?? prev: replace whenever the patch carried a value.
        if patch.conversation_key.is_some() {
            self.conversation_key = patch.conversation_key;
        }
        if patch.memory.is_some() {
            self.memory = patch.memory;
        }
        if patch.context.is_some() {
            self.context = patch.context;
        }
        if patch.is_global_search.is_some() {
            self.is_global_search = patch.is_global_search;
        }
        if patch.answer.is_some() {
            self.answer = patch.answer;
        }
        if patch.used_sources.is_some() {
            self.used_sources = patch.used_sources;
        }
        if patch.context_metrics.is_some() {
            self.context_metrics = patch.context_metrics;
        }
        if patch.document_intent.is_some() {
            self.document_intent = patch.document_intent;
        }
        if patch.search_intent.is_some() {
            self.search_intent = patch.search_intent;
        }
        if patch.analysis_intent.is_some() {
            self.analysis_intent = patch.analysis_intent;
        }
        if patch.kb_overview_intent.is_some() {
            self.kb_overview_intent = patch.kb_overview_intent;
        }
        if patch.kb_overview_data.is_some() {
            self.kb_overview_data = patch.kb_overview_data;
        }
        if patch.translated_question.is_some() {
            self.translated_question = patch.translated_question;
        }
        if patch.suggested_questions.is_some() {
            self.suggested_questions = patch.suggested_questions;
        }
        if patch.grounding_status.is_some() {
            self.grounding_status = patch.grounding_status;
        }

        // Replace: sources/tags are filter inputs, overwritten wholesale.
        if patch.sources.is_some() {
            self.sources = patch.sources;
        }
        if patch.tags.is_some() {
            self.tags = patch.tags;
        }

        // Monotonically nondecreasing (invariant I2).
        if let Some(retry_count) = patch.retry_count {
            self.retry_count = self.retry_count.max(retry_count);
        }

        // First error wins.
        if patch.error.is_some() {
            self.error = patch.error;
        }
    }
}

/// The partial state a node returns. Every field is `Option`; `None` means
/// "this node did not touch this field", matching the framework's "replace
/// if next is present, else keep prev" combiners.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatePatch {
    pub run_id: Option<String>,
    pub conversation_key: Option<String>,
    pub question: Option<String>,
    pub sources: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub memory: Option<String>,
    pub context: Option<String>,
    pub is_global_search: Option<bool>,
    pub answer: Option<String>,
    pub used_sources: Option<Vec<ChatSource>>,
    pub context_metrics: Option<HashMap<String, serde_json::Value>>,
    pub error: Option<String>,
    pub document_intent: Option<serde_json::Value>,
    pub search_intent: Option<bool>,
    pub analysis_intent: Option<bool>,
    pub kb_overview_intent: Option<bool>,
    pub kb_overview_data: Option<KbOverviewData>,
    pub translated_question: Option<String>,
    pub suggested_questions: Option<Vec<String>>,
    pub grounding_status: Option<GroundingStatus>,
    pub retry_count: Option<u32>,
}

impl StatePatch {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}
