//! Long-Context Map-Reduce Analyzer.
//!
//! Splits oversized context into fixed 4000-char windows and runs an
//! independent analysis prompt per chunk (the Map phase, concurrent), then
//! asks the model to merge those partial analyses into one report (the
//! Reduce phase). Below two chunks it skips straight to a single prompt.

use std::sync::Arc;

use chat_graph::llm::ChatModel;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

const CHUNK_SIZE: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Summary,
    EntityExtraction,
    KeyPoints,
    Comprehensive,
}

impl AnalysisType {
    /// The Map-phase, per-chunk instruction for this analysis type.
    fn chunk_instruction(&self) -> &'static str {
        match self {
            AnalysisType::Summary => "请对该片段进行简明扼要的内容摘要。",
            AnalysisType::EntityExtraction => {
                "请提取该片段中出现的关键实体（人物、机构、地点、产品等）。"
            }
            AnalysisType::KeyPoints => "请提炼该片段中的关键要点，以条目形式列出。",
            AnalysisType::Comprehensive => {
                "请对该片段进行全面深入的分析，涵盖主要观点、论据与结论。"
            }
        }
    }

    /// The Reduce-phase instruction label: `summary`
    /// reduces to "全文摘要", every other type reduces to "综合分析报告".
    fn reduce_label(&self) -> &'static str {
        match self {
            AnalysisType::Summary => "全文摘要",
            _ => "综合分析报告",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub analysis_type: AnalysisType,
    pub max_chunks: usize,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self { analysis_type: AnalysisType::Comprehensive, max_chunks: 10 }
    }
}

pub struct LongContextAnalyzer {
    model: Arc<dyn ChatModel>,
}

impl LongContextAnalyzer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn analyze(&self, text: &str, options: AnalyzeOptions) -> Result<String> {
        let chunks = chunk_text(text, CHUNK_SIZE, options.max_chunks);

        if chunks.len() <= 1 {
            let body = chunks.first().map(String::as_str).unwrap_or(text);
            let prompt = map_prompt(0, 1, options.analysis_type, body);
            return self.model.complete(&prompt).await.map_err(EngineError::from);
        }

        let total = chunks.len();
        let map_futures = chunks.iter().enumerate().map(|(idx, chunk)| {
            let prompt = map_prompt(idx, total, options.analysis_type, chunk);
            let model = Arc::clone(&self.model);
            async move { model.complete(&prompt).await }
        });
        let partials = try_join_all(map_futures).await?;

        let joined = partials.join("\n\n---\n\n");
        let reduce = reduce_prompt(options.analysis_type, &joined);
        self.model.complete(&reduce).await.map_err(EngineError::from)
    }
}

fn chunk_text(text: &str, chunk_size: usize, max_chunks: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() && chunks.len() < max_chunks {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        start = end;
    }
    chunks
}

/// Map prompt prefix.
fn map_prompt(idx: usize, total: usize, analysis_type: AnalysisType, chunk: &str) -> String {
    format!(
        "你是一个专业的文档分析师。请对以下文档片段进行分析（片段 {}/{}）。\n分析要求：{}\n\n文档片段：\n---\n{}\n---",
        idx + 1,
        total,
        analysis_type.chunk_instruction(),
        chunk
    )
}

/// Reduce prompt.
fn reduce_prompt(analysis_type: AnalysisType, joined: &str) -> String {
    format!(
        "你是一个专业的文档分析师。请根据以下对文档各部分的初步分析结果，生成一份最终的完整分析报告。\n分析类型：{}\n汇总要求：逻辑清晰，重点突出，消除重复信息。\n\n初步分析结果：\n---\n{}\n---",
        analysis_type.reduce_label(),
        joined
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chat_graph::llm::{ChatRequest, ChatTokenStream};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatModel for CountingModel {
        async fn stream(&self, _request: ChatRequest) -> chat_graph::Result<ChatTokenStream> {
            unimplemented!("analyzer only calls complete()")
        }

        async fn complete(&self, prompt: &str) -> chat_graph::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("analysis-of[{}]", prompt.len()))
        }
    }

    #[tokio::test]
    async fn single_chunk_text_skips_reduce_phase() {
        let model = Arc::new(CountingModel { calls: AtomicUsize::new(0) });
        let analyzer = LongContextAnalyzer::new(model.clone());
        let result = analyzer
            .analyze("short text", AnalyzeOptions::default())
            .await
            .unwrap();
        assert!(result.starts_with("analysis-of"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn max_chunks_equal_one_matches_direct_analysis() {
        let text = "x".repeat(9000);
        let model = Arc::new(CountingModel { calls: AtomicUsize::new(0) });
        let analyzer = LongContextAnalyzer::new(model.clone());

        let direct = analyzer
            .analyze(&text, AnalyzeOptions { analysis_type: AnalysisType::Summary, max_chunks: 1 })
            .await
            .unwrap();
        let chunked_calls = model.calls.load(Ordering::SeqCst);
        assert_eq!(chunked_calls, 1);
        assert!(direct.starts_with("analysis-of"));
    }

    #[tokio::test]
    async fn multi_chunk_runs_map_then_reduce() {
        let text = "x".repeat(9000);
        let model = Arc::new(CountingModel { calls: AtomicUsize::new(0) });
        let analyzer = LongContextAnalyzer::new(model.clone());
        analyzer.analyze(&text, AnalyzeOptions::default()).await.unwrap();

        // 9000 chars / 4000 = 3 chunks (Map) + 1 Reduce call.
        assert_eq!(model.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn chunking_caps_at_max_chunks() {
        let text = "x".repeat(100_000);
        let chunks = chunk_text(&text, CHUNK_SIZE, 10);
        assert_eq!(chunks.len(), 10);
    }
}
