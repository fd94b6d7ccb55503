//! Typed run events: the wire contract between the engine and its observers.

use crate::provider::TokenUsage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The model answered without requesting more tools.
    Completed,
    /// A fatal error ended the run.
    Error,
    /// The run was cancelled by its owner.
    Cancelled,
}

impl RunStatus {
    /// The status' wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Machine-readable codes for fatal run errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunErrorCode {
    /// Elapsed time passed the run timeout at a step boundary.
    Timeout,
    /// The step budget ran out before the model finished.
    MaxStepsExceeded,
    /// The model client failed after all retries.
    ModelError,
}

/// Code and human-readable message for a fatal run error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunErrorInfo {
    /// Machine-readable error code.
    pub code: RunErrorCode,
    /// Human-readable detail.
    pub message: String,
}

/// Final outcome payload carried by `run:completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Terminal status (always `completed` on this event).
    pub status: RunStatus,
    /// The model's final text.
    pub response: String,
    /// Steps executed, 1-based count.
    pub steps: u32,
    /// Token usage aggregated over every model call in the run.
    pub usage: TokenUsage,
}

/// One state transition of a run.
///
/// Events are emitted in strict causal order per run and consumed as a log,
/// never a snapshot. The serialized form is the external wire contract:
/// a `kind` tag plus camelCase payload fields, durations in milliseconds.
///
/// ```
/// use ace::engine::AgentEvent;
///
/// let event = AgentEvent::StepStarted { step: 1 };
/// let json = serde_json::to_value(&event).unwrap();
/// assert_eq!(json["kind"], "step:started");
/// assert_eq!(json["step"], 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AgentEvent {
    /// A run began.
    #[serde(rename = "run:started", rename_all = "camelCase")]
    RunStarted {
        /// The run's unique id.
        run_id: String,
        /// Agent identity the run executes under.
        agent_id: String,
    },

    /// A step began.
    #[serde(rename = "step:started")]
    StepStarted {
        /// 1-based step index.
        step: u32,
    },

    /// A model call is about to be made.
    #[serde(rename = "model:request")]
    ModelRequest {
        /// Number of messages in the windowed prompt.
        tokens: u32,
    },

    /// A streamed fragment of model output.
    #[serde(rename = "model:chunk")]
    ModelChunk {
        /// Text fragment, in stream order.
        content: String,
    },

    /// A model call finished.
    #[serde(rename = "model:response")]
    ModelResponse {
        /// Token usage for this call.
        usage: TokenUsage,
    },

    /// A tool invocation was requested by the model.
    #[serde(rename = "tool:started")]
    ToolStarted {
        /// Tool name.
        tool: String,
        /// Model-supplied input.
        input: Value,
    },

    /// A tool handler ran and returned output.
    #[serde(rename = "tool:completed")]
    ToolCompleted {
        /// Tool name.
        tool: String,
        /// Handler output.
        output: Value,
        /// Wall-clock handler duration in milliseconds.
        duration: u64,
    },

    /// A tool invocation failed (unknown tool, handler error, or denial).
    #[serde(rename = "tool:error")]
    ToolError {
        /// Tool name.
        tool: String,
        /// Error detail fed back to the model.
        error: String,
        /// Whether the run continues past this error. Always true today.
        recoverable: bool,
    },

    /// A gated tool is waiting on a human decision.
    #[serde(rename = "tool:approval:required", rename_all = "camelCase")]
    ApprovalRequired {
        /// Tool name.
        tool: String,
        /// Model-supplied input, for display.
        input: Value,
        /// Fresh id the resolver must echo back.
        approval_id: String,
    },

    /// A pending approval was granted.
    #[serde(rename = "tool:approval:granted", rename_all = "camelCase")]
    ApprovalGranted {
        /// Id of the resolved approval.
        approval_id: String,
    },

    /// A pending approval was denied.
    #[serde(rename = "tool:approval:denied", rename_all = "camelCase")]
    ApprovalDenied {
        /// Id of the resolved approval.
        approval_id: String,
        /// Why it was denied.
        reason: String,
    },

    /// A step finished.
    #[serde(rename = "step:completed")]
    StepCompleted {
        /// 1-based step index.
        step: u32,
        /// Wall-clock step duration in milliseconds.
        duration: u64,
    },

    /// The run reached its happy terminal state.
    #[serde(rename = "run:completed", rename_all = "camelCase")]
    RunCompleted {
        /// The run's unique id.
        run_id: String,
        /// Final outcome.
        result: RunResult,
    },

    /// The run ended with a fatal error.
    #[serde(rename = "run:error", rename_all = "camelCase")]
    RunError {
        /// The run's unique id.
        run_id: String,
        /// What went wrong.
        error: RunErrorInfo,
    },

    /// The run was cancelled.
    #[serde(rename = "run:cancelled", rename_all = "camelCase")]
    RunCancelled {
        /// The run's unique id.
        run_id: String,
    },
}

impl AgentEvent {
    /// The wire-level kind tag.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::RunStarted { .. } => "run:started",
            AgentEvent::StepStarted { .. } => "step:started",
            AgentEvent::ModelRequest { .. } => "model:request",
            AgentEvent::ModelChunk { .. } => "model:chunk",
            AgentEvent::ModelResponse { .. } => "model:response",
            AgentEvent::ToolStarted { .. } => "tool:started",
            AgentEvent::ToolCompleted { .. } => "tool:completed",
            AgentEvent::ToolError { .. } => "tool:error",
            AgentEvent::ApprovalRequired { .. } => "tool:approval:required",
            AgentEvent::ApprovalGranted { .. } => "tool:approval:granted",
            AgentEvent::ApprovalDenied { .. } => "tool:approval:denied",
            AgentEvent::StepCompleted { .. } => "step:completed",
            AgentEvent::RunCompleted { .. } => "run:completed",
            AgentEvent::RunError { .. } => "run:error",
            AgentEvent::RunCancelled { .. } => "run:cancelled",
        }
    }

    /// Whether this event ends its run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentEvent::RunCompleted { .. }
                | AgentEvent::RunError { .. }
                | AgentEvent::RunCancelled { .. }
        )
    }

    /// Whether this event is part of the approval lifecycle.
    pub fn is_approval(&self) -> bool {
        matches!(
            self,
            AgentEvent::ApprovalRequired { .. }
                | AgentEvent::ApprovalGranted { .. }
                | AgentEvent::ApprovalDenied { .. }
        )
    }

    /// Frame this event for a server-sent-events transport.
    pub fn sse_frame(&self) -> String {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("event: {}\ndata: {}\n\n", self.kind(), data)
    }
}
