//! Chat request construction.

use crate::messages::Message;

/// Input to [`ChatModel::stream`](crate::llm::ChatModel::stream).
///
/// Mirrors the `generate` node's contract: `(question, context,
/// isGlobalSearch, memory)`.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub question: String,
    pub context: Option<String>,
    pub is_global_search: bool,
    pub memory: Option<String>,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: None,
            is_global_search: false,
            memory: None,
            temperature: 0.2,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_global_search(mut self, is_global_search: bool) -> Self {
        self.is_global_search = is_global_search;
        self
    }

    pub fn with_memory(mut self, memory: impl Into<String>) -> Self {
        self.memory = Some(memory.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    /// Render the system-style prompt the request implies. Kept here (rather
    /// than duplicated per provider) since every provider sees the same
    /// instruction format.
    pub fn as_messages(&self) -> Vec<Message> {
        let mut messages = Vec::new();
        let mut system = String::from(
            "You are a knowledge-base assistant. Answer using only the provided context \
             and cite sources as [N] referring to their 1-based position.",
        );
        if let Some(memory) = &self.memory {
            system.push_str("\n\nConversation memory:\n");
            system.push_str(memory);
        }
        if let Some(context) = &self.context {
            system.push_str("\n\nContext:\n");
            system.push_str(context);
        }
        messages.push(Message::system(system));
        messages.push(Message::human(self.question.clone()));
        messages
    }
}
