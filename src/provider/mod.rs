//! Model client abstraction.
//!
//! The run engine consumes one opaque boundary for language-model inference:
//! a [`ModelClient`] that can `generate` a full response and, when the
//! implementation supports it, `generate_stream` incremental chunks. Vendor
//! wire protocols live behind this trait and are not this crate's concern.

pub mod traits;
pub mod types;

// Re-export main types
pub use traits::{ModelClient, ModelStream, StreamChunk};
pub use types::{ModelRequest, ModelResponse, TokenUsage, ToolInvocation, ToolSchema};
