//! Storage traits for run state and conversation records.

use crate::store::models::{Conversation, RunState};
use async_trait::async_trait;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Error types for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error during a store operation
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Record not found (or expired)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Connection error (for networked providers)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic provider error
    #[error("Store error: {0}")]
    Backend(String),
}

/// Persistence for run-level checkpoints.
///
/// One [`RunState`] per run id, replaced wholesale on every `set`. The store
/// stamps `updated_at` on write; a configured ttl makes expired entries
/// indistinguishable from missing ones.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// The provider name (e.g. "memory", "file", "mongodb")
    fn provider_name(&self) -> &'static str;

    /// Check if the provider is reachable/usable
    async fn is_available(&self) -> bool;

    /// Fetch the state for a run. Expired entries report `NotFound`.
    async fn get(&self, run_id: &str) -> StoreResult<RunState>;

    /// Write the state for a run, stamping `updated_at`.
    async fn set(&self, state: RunState) -> StoreResult<()>;

    /// Remove the state for a run. Removing an absent run is not an error.
    async fn delete(&self, run_id: &str) -> StoreResult<()>;
}

/// Persistence for conversation records.
///
/// Records are replaced wholesale by `update`; the coordinator holds the
/// only write path during a run, so there is no partial-append race.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The provider name (e.g. "memory", "file", "mongodb")
    fn provider_name(&self) -> &'static str;

    /// Check if the provider is reachable/usable
    async fn is_available(&self) -> bool;

    /// All conversations owned by `owner_id`, most recently updated first.
    async fn list(&self, owner_id: &str) -> StoreResult<Vec<Conversation>>;

    /// Fetch one conversation by id. Expired records report `NotFound`.
    async fn get(&self, id: &str) -> StoreResult<Conversation>;

    /// Create a conversation with a fresh id.
    async fn create(&self, owner_id: &str, title: Option<&str>) -> StoreResult<Conversation>;

    /// Replace the stored record, stamping `updated_at`. Acts as an upsert.
    async fn update(&self, conversation: &Conversation) -> StoreResult<()>;

    /// Change a conversation's title.
    async fn rename(&self, id: &str, title: &str) -> StoreResult<()>;

    /// Remove a conversation. Removing an absent id is not an error.
    async fn delete(&self, id: &str) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NotFound("run-42".to_string());
        assert_eq!(err.to_string(), "Not found: run-42");

        let err = StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_store_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StoreError>();
    }
}
