//! `translate`: translates non-Chinese (specifically English,
//! per current policy) questions into the configured target language.
//! Never fatal — a translator failure is logged and the question is left
//! untranslated.

use std::sync::Arc;

use async_trait::async_trait;
use chat_graph::{ChatGraphState, ChatSinks, GraphNode, Result, StatePatch};
use tracing::warn;

use crate::capabilities::Translator;
use crate::nodes::contains_cjk;

pub struct TranslateNode {
    translator: Arc<dyn Translator>,
    target_language: String,
}

impl TranslateNode {
    pub fn new(translator: Arc<dyn Translator>, target_language: impl Into<String>) -> Self {
        Self { translator, target_language: target_language.into() }
    }
}

#[async_trait]
impl GraphNode for TranslateNode {
    fn name(&self) -> &'static str {
        "translate"
    }

    async fn run(&self, state: &ChatGraphState, _sinks: &ChatSinks) -> Result<StatePatch> {
        if state.error.is_some() {
            return Ok(StatePatch::empty());
        }
        if contains_cjk(&state.question) {
            return Ok(StatePatch::empty());
        }

        match self.translator.translate(&state.question, &self.target_language).await {
            Ok(translated) => Ok(StatePatch { translated_question: Some(translated), ..StatePatch::empty() }),
            Err(err) => {
                warn!(error = %err, "translate: translation failed, continuing untranslated");
                Ok(StatePatch::empty())
            }
        }
    }
}
