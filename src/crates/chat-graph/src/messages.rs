//! Minimal message types shared between the graph, the context/memory layer,
//! and chat model requests. This is a deliberately small subset of what a
//! general-purpose message-graph framework carries (no tool calls, no
//! multi-part content) since the chat pipeline only ever needs role + text.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    Human,
    Ai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Ai,
            content: content.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.content
    }
}
