//! Tool definitions pairing a model-facing schema with an executable handler.

use crate::tool::context::ToolContext;
use crate::tool::error::ToolError;
use crate::tool::source::ToolSource;
use serde_json::Value;
use std::sync::Arc;

/// Executable side of a tool.
///
/// Handlers receive the model-supplied input (already parsed JSON) and the
/// per-step [`ToolContext`]. They return a JSON output value, or a
/// [`ToolError`] that the dispatcher folds into a tool_result error string.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
	/// Execute the tool against the given input.
	async fn call(&self, input: Value, context: &ToolContext) -> Result<Value, ToolError>;
}

/// Wraps a synchronous closure as a [`ToolHandler`].
struct FnHandler<F> {
	f: F,
}

#[async_trait::async_trait]
impl<F> ToolHandler for FnHandler<F>
where
	F: Fn(Value, &ToolContext) -> Result<Value, ToolError> + Send + Sync,
{
	async fn call(&self, input: Value, context: &ToolContext) -> Result<Value, ToolError> {
		(self.f)(input, context)
	}
}

/// A registered tool: schema, execution policy, and handler.
///
/// The `name`, `description`, and `input_schema` are what the model sees;
/// `requires_approval` gates execution behind a human decision; the handler
/// is what the dispatcher actually runs.
///
/// # Example
///
/// ```
/// use ace::tool::{ToolDefinition, ToolSource};
/// use serde_json::json;
///
/// let tool = ToolDefinition::from_fn(
/// 	"echo",
/// 	"Echo the input back",
/// 	json!({
/// 		"type": "object",
/// 		"properties": {
/// 			"text": { "type": "string" }
/// 		},
/// 		"required": ["text"]
/// 	}),
/// 	|input, _context| Ok(input),
/// );
/// assert_eq!(tool.name, "echo");
/// assert_eq!(tool.source, ToolSource::Native);
/// assert!(!tool.requires_approval);
/// ```
#[derive(Clone)]
pub struct ToolDefinition {
	/// Unique tool name (the model calls it by this).
	pub name: String,
	/// Human-readable description shown to the model.
	pub description: String,
	/// JSON Schema for the tool's input.
	pub input_schema: Value,
	/// Where this tool came from.
	pub source: ToolSource,
	/// Whether each invocation must be approved before the handler runs.
	pub requires_approval: bool,
	handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
	/// Create a tool definition with the given handler.
	pub fn new(
		name: impl Into<String>,
		description: impl Into<String>,
		input_schema: Value,
		handler: Arc<dyn ToolHandler>,
	) -> Self {
		Self {
			name: name.into(),
			description: description.into(),
			input_schema,
			source: ToolSource::default(),
			requires_approval: false,
			handler,
		}
	}

	/// Create a tool definition from a synchronous closure.
	///
	/// Convenient for simple in-process tools and tests; the closure runs
	/// inline on the dispatcher's task.
	pub fn from_fn<F>(
		name: impl Into<String>,
		description: impl Into<String>,
		input_schema: Value,
		f: F,
	) -> Self
	where
		F: Fn(Value, &ToolContext) -> Result<Value, ToolError> + Send + Sync + 'static,
	{
		Self::new(name, description, input_schema, Arc::new(FnHandler { f }))
	}

	/// Set the tool source.
	pub fn with_source(mut self, source: ToolSource) -> Self {
		self.source = source;
		self
	}

	/// Set whether invocations require human approval.
	pub fn with_approval(mut self, required: bool) -> Self {
		self.requires_approval = required;
		self
	}

	/// The executable handler.
	pub fn handler(&self) -> &Arc<dyn ToolHandler> {
		&self.handler
	}
}

impl std::fmt::Debug for ToolDefinition {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ToolDefinition")
			.field("name", &self.name)
			.field("description", &self.description)
			.field("source", &self.source)
			.field("requires_approval", &self.requires_approval)
			.finish_non_exhaustive()
	}
}
