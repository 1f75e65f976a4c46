//! Database models
//!
//! Core data models for persistent storage in the chat engine's SQLite
//! database. All timestamp fields are stored as ISO8601 strings (TEXT in
//! SQLite) due to sqlx/SQLite type limitations with `chrono::DateTime<Utc>`.

pub mod conversation;
pub mod conversation_memory;
pub mod message;

pub use conversation::Conversation;
pub use conversation_memory::ConversationMemory;
pub use message::StoredMessage;
