//! `docGenerate`: the document-intent branch. Streams generated
//! document content the same way `generate` streams an answer, clears
//! `usedSources`, and routes straight to `memoryUpdate` (the runner's fixed
//! topology handles the routing; this node only produces the patch).

use std::sync::Arc;

use async_trait::async_trait;
use chat_graph::{ChatGraphState, ChatSinks, GraphError, GraphNode, Result, StatePatch};
use futures::StreamExt;

use crate::capabilities::DocumentGenerator;

pub struct DocGenerateNode {
    generator: Arc<dyn DocumentGenerator>,
}

impl DocGenerateNode {
    pub fn new(generator: Arc<dyn DocumentGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl GraphNode for DocGenerateNode {
    fn name(&self) -> &'static str {
        "doc_generate"
    }

    async fn run(&self, state: &ChatGraphState, sinks: &ChatSinks) -> Result<StatePatch> {
        if state.error.is_some() {
            return Ok(StatePatch::empty());
        }

        let mut stream = self
            .generator
            .generate(&state.question, state.sources.as_deref())
            .await
            .map_err(|err| GraphError::Other(err.to_string()))?;

        let mut answer = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            sinks.emit_token(chunk.clone());
            answer.push_str(&chunk);
        }

        Ok(StatePatch { answer: Some(answer), used_sources: Some(Vec::new()), ..StatePatch::empty() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as EngineResult;
    use chat_graph::llm::ChatTokenStream;
    use futures::stream;

    struct FakeGenerator;

    #[async_trait]
    impl DocumentGenerator for FakeGenerator {
        async fn generate(&self, question: &str, _sources: Option<&[String]>) -> EngineResult<ChatTokenStream> {
            let chunks = vec![Ok(format!("draft for: {question}"))];
            Ok(Box::pin(stream::iter(chunks)))
        }
    }

    #[tokio::test]
    async fn generates_and_clears_used_sources() {
        let node = DocGenerateNode::new(Arc::new(FakeGenerator));
        let state = ChatGraphState::new("run-1", "write a report");
        let patch = node.run(&state, &ChatSinks::default()).await.unwrap();
        assert_eq!(patch.answer.as_deref(), Some("draft for: write a report"));
        assert_eq!(patch.used_sources, Some(Vec::new()));
    }
}
