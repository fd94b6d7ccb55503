//! Tool registry and dispatch.
//!
//! Tools pair a model-facing JSON Schema with an executable handler. The
//! [`ToolDispatcher`] keys them by name and runs them with cancellation
//! checks on both sides of the handler; every call produces a
//! [`ToolExecutionResult`], never an `Err`, so the model always gets a
//! tool_result entry back.
//!
//! # Quick Start
//!
//! ```
//! use ace::tool::{ToolDefinition, ToolDispatcher};
//! use serde_json::json;
//!
//! let mut dispatcher = ToolDispatcher::new();
//!
//! dispatcher.register(ToolDefinition::from_fn(
//! 	"read_file",
//! 	"Read the contents of a file",
//! 	json!({
//! 		"type": "object",
//! 		"properties": {
//! 			"path": { "type": "string", "description": "File path" }
//! 		},
//! 		"required": ["path"]
//! 	}),
//! 	|input, _context| Ok(input),
//! ));
//!
//! assert!(dispatcher.contains("read_file"));
//! ```
//!
//! Handlers that perform real async work implement [`ToolHandler`] directly;
//! [`ToolDefinition::from_fn`] covers the synchronous case.

mod context;
mod definition;
mod dispatcher;
mod error;
mod source;

pub use context::ToolContext;
pub use definition::{ToolDefinition, ToolHandler};
pub use dispatcher::{ToolCall, ToolDispatcher, ToolExecutionResult};
pub use error::ToolError;
pub use source::ToolSource;

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;
