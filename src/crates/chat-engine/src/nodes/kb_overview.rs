//! `kbOverview`: renders a human-readable snapshot summary into
//! `context` and records the structured `kbOverviewData`. Never fatal — a
//! snapshot fetch failure is logged and the node passes the state through.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chat_graph::{ChatGraphState, ChatSinks, GraphNode, KbOverviewData, Result, StatePatch};
use tracing::warn;

use crate::capabilities::KbSnapshotProvider;

pub struct KbOverviewNode {
    provider: Arc<dyn KbSnapshotProvider>,
}

impl KbOverviewNode {
    pub fn new(provider: Arc<dyn KbSnapshotProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl GraphNode for KbOverviewNode {
    fn name(&self) -> &'static str {
        "kb_overview"
    }

    async fn run(&self, state: &ChatGraphState, _sinks: &ChatSinks) -> Result<StatePatch> {
        if state.error.is_some() {
            return Ok(StatePatch::empty());
        }

        let snapshot = match self.provider.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "kb_overview: snapshot unavailable, passing through");
                return Ok(StatePatch::empty());
            }
        };

        let total_files = snapshot.files.len();
        let total_chunks: usize = snapshot.files.iter().map(|f| f.chunk_count).sum();

        let mut tag_stats: HashMap<String, usize> = HashMap::new();
        for file in &snapshot.files {
            for tag in &file.tags {
                *tag_stats.entry(tag.clone()).or_insert(0) += 1;
            }
        }

        let mut recent: Vec<_> = snapshot.files.iter().collect();
        recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        recent.truncate(5);

        let mut lines = vec![format!("- 总文件数: {}", total_files)];
        for tag in &snapshot.available_tags {
            if let Some(count) = tag_stats.get(&tag.id) {
                lines.push(format!("- {}: {} 个文件", tag.name, count));
            }
        }
        if !recent.is_empty() {
            lines.push("- 最近更新:".to_string());
            for file in &recent {
                lines.push(format!("  - {}", file.name));
            }
        }
        let overview = lines.join("\n");

        let context = match &state.context {
            Some(existing) => format!("{existing}\n{overview}"),
            None => overview,
        };

        Ok(StatePatch {
            context: Some(context),
            kb_overview_data: Some(KbOverviewData { total_files, total_chunks, tag_stats }),
            ..StatePatch::empty()
        })
    }
}
