//! Human-in-the-loop approval gating for sensitive tools.

use serde_json::Value;

/// Everything a human needs to judge one gated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRequest {
    /// Fresh id the resolver must echo back.
    pub approval_id: String,
    /// Run awaiting the decision.
    pub run_id: String,
    /// Tool the model wants to invoke.
    pub tool: String,
    /// Model-supplied input, for display.
    pub input: Value,
}

/// Outcome of an approval request.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalDecision {
    /// Execute the tool.
    Approved,
    /// Skip the handler and feed an error tool_result back to the model.
    Denied {
        /// Why it was denied.
        reason: String,
    },
}

impl ApprovalDecision {
    /// A denial with the given reason.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
        }
    }

    /// Whether the tool may execute.
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Where the engine parks a run while a human decides.
///
/// The wait has no timeout; a run can suspend on it indefinitely. The engine
/// races the wait against its cancellation token, so gates do not need to
/// resolve on cancellation themselves.
#[async_trait::async_trait]
pub trait ApprovalGate: Send + Sync {
    /// Ask for a decision on one gated invocation.
    async fn request(&self, request: ApprovalRequest) -> ApprovalDecision;
}

/// A gate that answers every request the same way without asking anyone.
///
/// `approve_all` suits trusted tool sets and tests; `deny_all` locks gated
/// tools out entirely.
#[derive(Debug, Clone, Copy)]
pub struct AutoApprovalGate {
    approve: bool,
}

impl AutoApprovalGate {
    /// A gate that approves every request.
    pub fn approve_all() -> Self {
        Self { approve: true }
    }

    /// A gate that denies every request.
    pub fn deny_all() -> Self {
        Self { approve: false }
    }
}

#[async_trait::async_trait]
impl ApprovalGate for AutoApprovalGate {
    async fn request(&self, _request: ApprovalRequest) -> ApprovalDecision {
        if self.approve {
            ApprovalDecision::Approved
        } else {
            ApprovalDecision::denied("denied by policy")
        }
    }
}
