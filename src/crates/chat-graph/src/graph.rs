//! The graph runner: a fixed topology, not a general graph engine.
//!
//! The topology is known at build time (see module docs on
//! [`ChatGraphRunner`]), so unlike a general-purpose state-graph framework
//! this runner does not walk an edge list — it is the topology, expressed as
//! straight-line async control flow with two conditional branch points
//! (`route` after `preprocess`, `should_regenerate` after `groundingCheck`).
//! Both branch functions are pure and exposed standalone so they can be
//! property-tested without executing a node.

use crate::node::GraphNode;
use crate::state::{ChatGraphState, ChatSinks, GroundingStatus, StatePatch};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Where `preprocess` routes to. `End` only ever arises from a validation
/// error (`route` never returns `End` for any other reason).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    DocGenerate,
    KbOverview,
    Translate,
    End,
}

/// Pure routing decision for the `preprocess -> {docGenerate | kbOverview |
/// translate | END}` conditional edge.
pub fn route(state: &ChatGraphState) -> Route {
    if state.error.is_some() {
        return Route::End;
    }
    let document_intent_truthy = state
        .document_intent
        .as_ref()
        .is_some_and(|v| !v.is_null() && *v != serde_json::Value::Bool(false));
    if document_intent_truthy {
        return Route::DocGenerate;
    }
    if state.kb_overview_intent == Some(true) {
        return Route::KbOverview;
    }
    Route::Translate
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundingNext {
    Generate,
    Suggest,
}

/// Pure routing decision for the `groundingCheck -> {generate | suggest}`
/// conditional edge. On error, routes to `suggest` so `memoryUpdate` still
/// runs and any partial answer gets persisted.
pub fn should_regenerate(state: &ChatGraphState) -> GroundingNext {
    if state.error.is_some() {
        return GroundingNext::Suggest;
    }
    if state.grounding_status == Some(GroundingStatus::InvalidCitations) && state.retry_count < 1 {
        GroundingNext::Generate
    } else {
        GroundingNext::Suggest
    }
}

/// The ten named stages wired into the fixed topology described in the
/// design's `Graph Runner` section. Each field is a trait object so tests
/// can substitute fakes for any stage independently.
pub struct ChatGraphRunner {
    pub preprocess: Arc<dyn GraphNode>,
    pub doc_generate: Arc<dyn GraphNode>,
    pub kb_overview: Arc<dyn GraphNode>,
    pub translate: Arc<dyn GraphNode>,
    pub memory_load: Arc<dyn GraphNode>,
    pub retrieve: Arc<dyn GraphNode>,
    pub generate: Arc<dyn GraphNode>,
    pub postcheck: Arc<dyn GraphNode>,
    pub grounding_check: Arc<dyn GraphNode>,
    pub suggest: Arc<dyn GraphNode>,
    pub memory_update: Arc<dyn GraphNode>,
}

impl ChatGraphRunner {
    /// Execute one node and fold its patch into `state`, logging failures
    /// as a state error rather than propagating (nodes are expected to
    /// catch their own internal faults per the `persistence_soft_fail` /
    /// `callback_fault` policies; a node that still returns `Err` is treated
    /// as a hard failure equivalent to the node setting `state.error`).
    #[instrument(skip_all, fields(node = node.name()))]
    async fn step(&self, node: &Arc<dyn GraphNode>, state: &mut ChatGraphState, sinks: &ChatSinks) {
        match node.run(state, sinks).await {
            Ok(patch) => state.apply(patch),
            Err(err) => {
                error!(error = %err, "node failed");
                state.apply(StatePatch::with_error(err.to_string()));
            }
        }
    }

    /// Walk the fixed topology to completion and return the final state.
    pub async fn run(&self, mut state: ChatGraphState, sinks: ChatSinks) -> ChatGraphState {
        self.step(&self.preprocess, &mut state, &sinks).await;

        match route(&state) {
            Route::End => return state,
            Route::DocGenerate => {
                self.step(&self.doc_generate, &mut state, &sinks).await;
                self.step(&self.memory_update, &mut state, &sinks).await;
                return state;
            }
            Route::KbOverview => {
                self.step(&self.kb_overview, &mut state, &sinks).await;
                self.step(&self.translate, &mut state, &sinks).await;
            }
            Route::Translate => {
                self.step(&self.translate, &mut state, &sinks).await;
            }
        }

        self.step(&self.memory_load, &mut state, &sinks).await;
        self.step(&self.retrieve, &mut state, &sinks).await;
        self.step(&self.generate, &mut state, &sinks).await;
        self.step(&self.postcheck, &mut state, &sinks).await;
        self.step(&self.grounding_check, &mut state, &sinks).await;

        loop {
            match should_regenerate(&state) {
                GroundingNext::Generate => {
                    debug!(retry_count = state.retry_count, "regenerating for invalid citations");
                    self.step(&self.generate, &mut state, &sinks).await;
                    self.step(&self.postcheck, &mut state, &sinks).await;
                    self.step(&self.grounding_check, &mut state, &sinks).await;
                }
                GroundingNext::Suggest => break,
            }
        }

        self.step(&self.suggest, &mut state, &sinks).await;
        self.step(&self.memory_update, &mut state, &sinks).await;

        if state.retry_count > 1 {
            warn!(retry_count = state.retry_count, "retry budget exceeded, this should be unreachable");
        }

        state
    }
}
