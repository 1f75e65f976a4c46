//! Streaming response types.

use futures::stream::BoxStream;

/// A stream of text chunks from the chat model. Each item is one chunk as
/// the provider emitted it; the pipeline does not re-buffer or re-split
/// chunks before forwarding them to `on_token`.
pub type ChatTokenStream = BoxStream<'static, crate::error::Result<String>>;
