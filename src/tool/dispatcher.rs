//! Tool dispatch: name-keyed lookup and guarded execution.

use crate::tool::context::ToolContext;
use crate::tool::definition::ToolDefinition;
use crate::tool::error::ToolError;
use crate::tool::source::ToolSource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

/// One tool invocation to execute, as requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
	/// Model-assigned correlation id.
	pub id: String,
	/// Name of the tool to invoke.
	pub name: String,
	/// Parsed JSON input.
	pub input: Value,
}

impl ToolCall {
	/// Create a tool call.
	pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			input,
		}
	}
}

/// Outcome of one tool invocation.
///
/// Exactly one of `output` and `error` is set. These are serialized as the
/// tool_result payloads fed back to the model, so the field names are wire
/// names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionResult {
	/// Correlation id of the call that produced this result.
	pub call_id: String,
	/// Tool name.
	pub tool: String,
	/// Handler output on success.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub output: Option<Value>,
	/// Error string on failure (unknown tool, handler error, cancellation,
	/// denial).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	/// Wall-clock execution time in milliseconds.
	pub duration_ms: u64,
}

impl ToolExecutionResult {
	/// A successful result.
	pub fn success(
		call_id: impl Into<String>,
		tool: impl Into<String>,
		output: Value,
		duration_ms: u64,
	) -> Self {
		Self {
			call_id: call_id.into(),
			tool: tool.into(),
			output: Some(output),
			error: None,
			duration_ms,
		}
	}

	/// A failed result carrying an error string.
	pub fn failure(
		call_id: impl Into<String>,
		tool: impl Into<String>,
		error: impl Into<String>,
		duration_ms: u64,
	) -> Self {
		Self {
			call_id: call_id.into(),
			tool: tool.into(),
			output: None,
			error: Some(error.into()),
			duration_ms,
		}
	}

	/// Whether this result carries an error.
	pub fn is_error(&self) -> bool {
		self.error.is_some()
	}
}

/// Name-keyed tool registry and executor.
///
/// Dispatch never returns `Err`: unknown tools, handler failures, and
/// cancellations all come back as a [`ToolExecutionResult`] with the error
/// field set, so the model always receives a tool_result for every call.
///
/// # Example
///
/// ```
/// use ace::tool::{ToolDefinition, ToolDispatcher};
/// use serde_json::json;
///
/// let mut dispatcher = ToolDispatcher::new();
/// dispatcher.register(ToolDefinition::from_fn(
/// 	"echo",
/// 	"Echo the input back",
/// 	json!({"type": "object"}),
/// 	|input, _context| Ok(input),
/// ));
/// assert!(dispatcher.contains("echo"));
/// assert_eq!(dispatcher.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ToolDispatcher {
	tools: HashMap<String, ToolDefinition>,
}

impl ToolDispatcher {
	/// Create an empty dispatcher.
	pub fn new() -> Self {
		Self {
			tools: HashMap::new(),
		}
	}

	/// Register a tool, replacing any existing tool with the same name.
	pub fn register(&mut self, definition: ToolDefinition) {
		self.tools.insert(definition.name.clone(), definition);
	}

	/// Register a tool in builder style.
	pub fn with_tool(mut self, definition: ToolDefinition) -> Self {
		self.register(definition);
		self
	}

	/// Remove a tool by name, returning it if present.
	pub fn remove(&mut self, name: &str) -> Option<ToolDefinition> {
		self.tools.remove(name)
	}

	/// Look up a tool by name.
	pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
		self.tools.get(name)
	}

	/// Whether a tool with this name is registered.
	pub fn contains(&self, name: &str) -> bool {
		self.tools.contains_key(name)
	}

	/// All registered tools, in no particular order.
	pub fn list(&self) -> Vec<&ToolDefinition> {
		self.tools.values().collect()
	}

	/// All registered tools from the given source.
	pub fn list_by_source(&self, source: ToolSource) -> Vec<&ToolDefinition> {
		self.tools.values().filter(|d| d.source == source).collect()
	}

	/// Names of all registered tools.
	pub fn names(&self) -> Vec<String> {
		self.tools.keys().cloned().collect()
	}

	/// Number of registered tools.
	pub fn len(&self) -> usize {
		self.tools.len()
	}

	/// Whether no tools are registered.
	pub fn is_empty(&self) -> bool {
		self.tools.is_empty()
	}

	/// Execute one call.
	///
	/// The cancellation token is checked before the handler runs and again
	/// after it returns; a token observed cancelled wins over whatever the
	/// handler produced.
	pub async fn execute(&self, call: &ToolCall, context: &ToolContext) -> ToolExecutionResult {
		if context.cancellation.is_cancelled() {
			return ToolExecutionResult::failure(
				&call.id,
				&call.name,
				ToolError::cancelled(&call.name).to_string(),
				0,
			);
		}

		let definition = match self.tools.get(&call.name) {
			Some(definition) => definition,
			None => {
				return ToolExecutionResult::failure(
					&call.id,
					&call.name,
					ToolError::not_found(&call.name).to_string(),
					0,
				);
			}
		};

		let started = Instant::now();
		let outcome = definition.handler().call(call.input.clone(), context).await;
		let duration_ms = started.elapsed().as_millis() as u64;

		if context.cancellation.is_cancelled() {
			return ToolExecutionResult::failure(
				&call.id,
				&call.name,
				ToolError::cancelled(&call.name).to_string(),
				duration_ms,
			);
		}

		match outcome {
			Ok(output) => ToolExecutionResult::success(&call.id, &call.name, output, duration_ms),
			Err(error) => {
				ToolExecutionResult::failure(&call.id, &call.name, error.to_string(), duration_ms)
			}
		}
	}

	/// Execute a batch of calls strictly in order, one at a time.
	///
	/// Once the token is observed cancelled, the remaining calls are not
	/// executed; they still get results, each carrying a cancellation error.
	/// The returned results are ordered identically to `calls`.
	pub async fn execute_batch(
		&self,
		calls: &[ToolCall],
		context: &ToolContext,
	) -> Vec<ToolExecutionResult> {
		let mut results = Vec::with_capacity(calls.len());
		for call in calls {
			if context.cancellation.is_cancelled() {
				results.push(ToolExecutionResult::failure(
					&call.id,
					&call.name,
					ToolError::cancelled(&call.name).to_string(),
					0,
				));
				continue;
			}
			results.push(self.execute(call, context).await);
		}
		results
	}
}

impl FromIterator<ToolDefinition> for ToolDispatcher {
	fn from_iter<I: IntoIterator<Item = ToolDefinition>>(iter: I) -> Self {
		let mut dispatcher = Self::new();
		for definition in iter {
			dispatcher.register(definition);
		}
		dispatcher
	}
}
