//! Execution context handed to tool handlers.

use std::collections::HashMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Ambient state a handler can read while executing.
///
/// The engine builds one context per step and shares it across that step's
/// batch. Handlers should treat it as read-only; the cancellation token is
/// the only live part.
///
/// # Example
///
/// ```
/// use ace::tool::ToolContext;
///
/// let context = ToolContext::new("run-1", "agent-1")
/// 	.with_step(3)
/// 	.with_working_dir("/tmp/workspace");
/// assert_eq!(context.step, 3);
/// assert!(!context.cancellation.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct ToolContext {
	/// Run this invocation belongs to.
	pub run_id: String,
	/// Agent identity the run executes under.
	pub agent_id: String,
	/// 1-based step index within the run.
	pub step: u32,
	/// Directory file-oriented handlers resolve relative paths against.
	pub working_dir: PathBuf,
	/// Host-supplied run parameters, as given to the run input.
	pub parameters: HashMap<String, serde_json::Value>,
	/// Cooperative cancellation signal for the run.
	pub cancellation: CancellationToken,
}

impl ToolContext {
	/// Create a context for the given run and agent.
	pub fn new(run_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
		Self {
			run_id: run_id.into(),
			agent_id: agent_id.into(),
			step: 0,
			working_dir: PathBuf::from("."),
			parameters: HashMap::new(),
			cancellation: CancellationToken::new(),
		}
	}

	/// Set the step index.
	pub fn with_step(mut self, step: u32) -> Self {
		self.step = step;
		self
	}

	/// Set the working directory.
	pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
		self.working_dir = working_dir.into();
		self
	}

	/// Set the run parameters.
	pub fn with_parameters(mut self, parameters: HashMap<String, serde_json::Value>) -> Self {
		self.parameters = parameters;
		self
	}

	/// Set the cancellation token shared with the run.
	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancellation = token;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_builder_defaults() {
		let context = ToolContext::new("run-9", "agent-a");
		assert_eq!(context.run_id, "run-9");
		assert_eq!(context.agent_id, "agent-a");
		assert_eq!(context.step, 0);
		assert!(context.parameters.is_empty());
	}

	#[test]
	fn test_cancellation_shared() {
		let token = CancellationToken::new();
		let context = ToolContext::new("run-9", "agent-a").with_cancellation(token.clone());
		token.cancel();
		assert!(context.cancellation.is_cancelled());
	}
}
