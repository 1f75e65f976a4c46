//! `preprocess`: validates the question and classifies the keyword/regex
//! intents. `documentIntent` is not computed here — it arrives already
//! populated on the initial state from an external detector and
//! this node leaves it untouched by never setting it on the patch.

use async_trait::async_trait;
use chat_graph::{ChatGraphState, ChatSinks, GraphError, GraphNode, Result, StatePatch};

use crate::intent;

pub struct PreprocessNode {
    web_search_enabled: bool,
}

impl PreprocessNode {
    pub fn new(web_search_enabled: bool) -> Self {
        Self { web_search_enabled }
    }
}

#[async_trait]
impl GraphNode for PreprocessNode {
    fn name(&self) -> &'static str {
        "preprocess"
    }

    async fn run(&self, state: &ChatGraphState, _sinks: &ChatSinks) -> Result<StatePatch> {
        let trimmed = state.question.trim();
        if trimmed.is_empty() {
            return Err(GraphError::EmptyQuestion);
        }

        Ok(StatePatch {
            question: Some(trimmed.to_string()),
            kb_overview_intent: Some(intent::is_kb_overview_intent(trimmed)),
            analysis_intent: Some(intent::is_analysis_intent(trimmed)),
            search_intent: Some(intent::is_search_intent(trimmed, self.web_search_enabled)),
            ..StatePatch::empty()
        })
    }
}
