//! `suggest`: generates follow-up questions. When `onSuggestions`
//! is wired up, generation runs detached — the graph does not block on it
//! and the callback fires later; otherwise the node blocks and populates
//! `suggestedQuestions` directly.

use std::sync::Arc;

use async_trait::async_trait;
use chat_graph::{ChatGraphState, ChatSinks, GraphNode, Result, StatePatch};
use tracing::warn;

use crate::capabilities::SuggestionGenerator;

const SUGGESTION_COUNT: usize = 3;
const SUGGESTION_TONE: &str = "professional";

pub struct SuggestNode {
    generator: Arc<dyn SuggestionGenerator>,
}

impl SuggestNode {
    pub fn new(generator: Arc<dyn SuggestionGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl GraphNode for SuggestNode {
    fn name(&self) -> &'static str {
        "suggest"
    }

    async fn run(&self, state: &ChatGraphState, sinks: &ChatSinks) -> Result<StatePatch> {
        if state.suggested_questions.is_some() || state.error.is_some() {
            return Ok(StatePatch::empty());
        }
        let Some(answer) = &state.answer else {
            return Ok(StatePatch::empty());
        };

        let context = format!("问题: {}\n回答: {}", state.question, answer);

        if let Some(on_suggestions) = sinks.on_suggestions.clone() {
            let generator = Arc::clone(&self.generator);
            tokio::spawn(async move {
                match generator.suggest(&context, SUGGESTION_COUNT, SUGGESTION_TONE).await {
                    Ok(suggestions) => on_suggestions(suggestions),
                    Err(err) => warn!(error = %err, "suggest: background generation failed"),
                }
            });
            return Ok(StatePatch::empty());
        }

        let suggestions = self
            .generator
            .suggest(&context, SUGGESTION_COUNT, SUGGESTION_TONE)
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "suggest: generation failed");
                Vec::new()
            });

        Ok(StatePatch { suggested_questions: Some(suggestions), ..StatePatch::empty() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as EngineResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::{sleep, Duration};

    struct FakeGenerator;

    #[async_trait]
    impl SuggestionGenerator for FakeGenerator {
        async fn suggest(&self, _context: &str, count: usize, _tone: &str) -> EngineResult<Vec<String>> {
            Ok((0..count).map(|i| format!("question {i}")).collect())
        }
    }

    #[tokio::test]
    async fn blocking_mode_populates_suggestions_directly() {
        let node = SuggestNode::new(Arc::new(FakeGenerator));
        let mut state = ChatGraphState::new("run-1", "q");
        state.answer = Some("a".into());
        let patch = node.run(&state, &ChatSinks::default()).await.unwrap();
        assert_eq!(patch.suggested_questions.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn background_mode_does_not_block_and_fires_callback_later() {
        let node = SuggestNode::new(Arc::new(FakeGenerator));
        let mut state = ChatGraphState::new("run-1", "q");
        state.answer = Some("a".into());

        let received = Arc::new(Mutex::new(None));
        let received_clone = Arc::clone(&received);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);

        let mut sinks = ChatSinks::default();
        sinks.on_suggestions = Some(Arc::new(move |suggestions: Vec<String>| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            *received_clone.lock().unwrap() = Some(suggestions);
        }));

        let patch = node.run(&state, &sinks).await.unwrap();
        assert!(patch.suggested_questions.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(received.lock().unwrap().as_ref().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn already_present_suggestions_pass_through() {
        let node = SuggestNode::new(Arc::new(FakeGenerator));
        let mut state = ChatGraphState::new("run-1", "q");
        state.answer = Some("a".into());
        state.suggested_questions = Some(vec!["existing".into()]);
        let patch = node.run(&state, &ChatSinks::default()).await.unwrap();
        assert!(patch.suggested_questions.is_none());
    }
}
