//! Coordinator-boundary errors.

use thiserror::Error;

/// Result alias for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// What can go wrong starting, stopping, or resolving runs.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The conversation already has an unaborted run registered.
    #[error("conversation {conversation_id} already has an active run")]
    RunConflict {
        /// The contested conversation.
        conversation_id: String,
    },

    /// The conversation does not exist, or the caller does not own it.
    /// Ownership failures deliberately look identical to missing records.
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// The approval does not exist, was already resolved, or the caller does
    /// not own it. Same deliberate ambiguity as above.
    #[error("approval not found: {0}")]
    ApprovalNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = CoordinatorError::RunConflict {
            conversation_id: "conv-1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "conversation conv-1 already has an active run"
        );

        let err = CoordinatorError::ApprovalNotFound("appr-9".to_string());
        assert_eq!(err.to_string(), "approval not found: appr-9");
    }
}
