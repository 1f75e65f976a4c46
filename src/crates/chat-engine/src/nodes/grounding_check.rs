//! `groundingCheck`: extracts bracketed citation indices from
//! `answer` and scores them against `usedSources` per the decision table.

use async_trait::async_trait;
use chat_graph::{ChatGraphState, ChatSinks, GraphNode, GroundingStatus, Result, StatePatch};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("citation pattern must compile"))
}

pub struct GroundingCheckNode;

#[async_trait]
impl GraphNode for GroundingCheckNode {
    fn name(&self) -> &'static str {
        "grounding_check"
    }

    async fn run(&self, state: &ChatGraphState, _sinks: &ChatSinks) -> Result<StatePatch> {
        if state.error.is_some() {
            return Ok(StatePatch::empty());
        }
        let Some(answer) = &state.answer else {
            return Ok(StatePatch { grounding_status: Some(GroundingStatus::Ok), ..StatePatch::empty() });
        };
        let source_count = state.used_sources.as_ref().map(Vec::len).unwrap_or(0);
        if source_count == 0 {
            return Ok(StatePatch { grounding_status: Some(GroundingStatus::Ok), ..StatePatch::empty() });
        }

        let cited: HashSet<i64> = citation_pattern()
            .captures_iter(answer)
            .filter_map(|caps| caps[1].parse::<i64>().ok())
            .collect();

        let status = if cited.is_empty() {
            GroundingStatus::MissingCitations
        } else if cited.iter().any(|&i| i < 1 || i as usize > source_count) {
            GroundingStatus::InvalidCitations
        } else {
            GroundingStatus::Ok
        };

        Ok(StatePatch { grounding_status: Some(status), ..StatePatch::empty() })
    }
}
