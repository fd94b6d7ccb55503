//! Error types for the tool module.

use thiserror::Error;

/// Errors that can occur during tool operations.
///
/// Dispatch itself never returns these to the caller; `execute` folds them
/// into the result's error string so the model sees every failure as a
/// tool_result. Handlers return them to describe what went wrong.
///
/// # Example
///
/// ```
/// use ace::tool::ToolError;
///
/// let error = ToolError::not_found("unknown_tool");
/// assert_eq!(error.to_string(), "Tool not found: unknown_tool");
/// ```
#[derive(Debug, Error)]
pub enum ToolError {
	/// The requested tool is not registered with the dispatcher.
	///
	/// The display form is the exact string surfaced to the model.
	#[error("Tool not found: {name}")]
	NotFound {
		/// Name of the tool that was not found.
		name: String,
	},

	/// The handler ran and failed.
	#[error("execution failed for {name}: {message}")]
	ExecutionFailed {
		/// Name of the tool that failed.
		name: String,
		/// Description of the failure.
		message: String,
	},

	/// The arguments provided to the tool were invalid.
	#[error("invalid arguments for {name}: {message}")]
	InvalidArguments {
		/// Name of the tool with invalid arguments.
		name: String,
		/// Description of the validation failure.
		message: String,
	},

	/// The run was cancelled before or while the tool executed.
	#[error("execution cancelled: {name}")]
	Cancelled {
		/// Name of the tool that was cancelled.
		name: String,
	},

	/// A human denied the approval request for this invocation.
	#[error("Tool execution denied by user: {reason}")]
	Denied {
		/// Reason given with the denial.
		reason: String,
	},

	/// A serialization or deserialization error occurred.
	#[error("serialization error: {message}")]
	SerializationError {
		/// Description of the serialization error.
		message: String,
	},
}

impl ToolError {
	/// Create a NotFound error for the given tool name.
	pub fn not_found(name: impl Into<String>) -> Self {
		Self::NotFound { name: name.into() }
	}

	/// Create an ExecutionFailed error.
	pub fn execution_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self::ExecutionFailed {
			name: name.into(),
			message: message.into(),
		}
	}

	/// Create an InvalidArguments error.
	pub fn invalid_arguments(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidArguments {
			name: name.into(),
			message: message.into(),
		}
	}

	/// Create a Cancelled error for the given tool name.
	pub fn cancelled(name: impl Into<String>) -> Self {
		Self::Cancelled { name: name.into() }
	}

	/// Create a Denied error with the given reason.
	pub fn denied(reason: impl Into<String>) -> Self {
		Self::Denied {
			reason: reason.into(),
		}
	}

	/// Create a SerializationError.
	pub fn serialization_error(message: impl Into<String>) -> Self {
		Self::SerializationError {
			message: message.into(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_not_found_display_is_exact() {
		let error = ToolError::not_found("my_tool");
		assert_eq!(error.to_string(), "Tool not found: my_tool");
	}

	#[test]
	fn test_execution_failed_error() {
		let error = ToolError::execution_failed("failing_tool", "connection timeout");
		assert!(error.to_string().contains("failing_tool"));
		assert!(error.to_string().contains("connection timeout"));
	}

	#[test]
	fn test_invalid_arguments_error() {
		let error = ToolError::invalid_arguments("strict_tool", "missing required field 'path'");
		assert!(error.to_string().contains("strict_tool"));
		assert!(error.to_string().contains("missing required field"));
	}

	#[test]
	fn test_cancelled_error() {
		let error = ToolError::cancelled("slow_tool");
		assert!(error.to_string().contains("cancelled"));
		assert!(error.to_string().contains("slow_tool"));
	}

	#[test]
	fn test_denied_error() {
		let error = ToolError::denied("too risky");
		assert!(error.to_string().contains("denied"));
		assert!(error.to_string().contains("too risky"));
	}

	#[test]
	fn test_error_is_send_sync() {
		fn assert_send_sync<T: Send + Sync>() {}
		assert_send_sync::<ToolError>();
	}
}
