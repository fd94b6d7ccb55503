//! Config-driven store construction with observable fallback.

use crate::store::file_backend::{FileConversationStore, FileStateStore};
use crate::store::memory_backend::{MemoryConversationStore, MemoryStateStore};
use crate::store::models::{StateConfig, StoreMode, StoreProvider};
use crate::store::traits::{ConversationStore, StateStore};
use std::sync::Arc;
use tracing::warn;

/// The stores the factory selected, plus how it selected them.
///
/// `mode` is `Degraded` when the configured provider was unusable and the
/// in-process store is standing in. Runs proceed either way; the host
/// decides whether a degraded store is worth alerting on.
#[derive(Clone)]
pub struct StoreHandle {
    /// Run-state store.
    pub state: Arc<dyn StateStore>,
    /// Conversation store.
    pub conversations: Arc<dyn ConversationStore>,
    /// Which store is actually in use.
    pub mode: StoreMode,
}

impl StoreHandle {
    /// An in-process handle, primary mode. Handy for tests and defaults.
    pub fn in_memory() -> Self {
        memory_handle(None, StoreMode::Primary)
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("state", &self.state.provider_name())
            .field("conversations", &self.conversations.provider_name())
            .field("mode", &self.mode)
            .finish()
    }
}

fn memory_handle(ttl: Option<u64>, mode: StoreMode) -> StoreHandle {
    StoreHandle {
        state: Arc::new(MemoryStateStore::new(ttl)),
        conversations: Arc::new(MemoryConversationStore::new(ttl)),
        mode,
    }
}

fn degrade(config: &StateConfig, reason: String) -> StoreHandle {
    warn!(
        target: "ace::store",
        provider = %config.provider,
        reason = %reason,
        "configured store unusable, falling back to in-process store"
    );
    memory_handle(config.ttl, StoreMode::Degraded { reason })
}

/// Build the stores described by `config`.
///
/// Never fails: a provider that cannot be constructed or reached degrades to
/// the in-process store, reported through [`StoreMode`] and a `tracing`
/// warning rather than an `Err`, so storage trouble cannot keep a run from
/// starting.
pub async fn connect(config: &StateConfig) -> StoreHandle {
    match config.provider {
        StoreProvider::Memory => memory_handle(config.ttl, StoreMode::Primary),
        StoreProvider::File => connect_file(config),
        StoreProvider::Mongodb => connect_mongodb(config).await,
    }
}

fn connect_file(config: &StateConfig) -> StoreHandle {
    let base_dir = config.file_path();
    let state = FileStateStore::open(&base_dir, config.ttl);
    let conversations = FileConversationStore::open(&base_dir, config.ttl);

    match (state, conversations) {
        (Ok(state), Ok(conversations)) => StoreHandle {
            state: Arc::new(state),
            conversations: Arc::new(conversations),
            mode: StoreMode::Primary,
        },
        (Err(e), _) | (_, Err(e)) => degrade(
            config,
            format!("file store at {} unusable: {}", base_dir.display(), e),
        ),
    }
}

#[cfg(feature = "store-mongodb")]
async fn connect_mongodb(config: &StateConfig) -> StoreHandle {
    use crate::store::mongodb_backend::{MongoConversationStore, MongoStateStore};

    let url = match &config.url {
        Some(url) => url.clone(),
        None => return degrade(config, "mongodb provider configured without url".to_string()),
    };
    let database = config.table.clone().unwrap_or_else(|| "ace".to_string());

    let state = MongoStateStore::connect(&url, &database, config.ttl).await;
    let conversations = MongoConversationStore::connect(&url, &database, config.ttl).await;

    match (state, conversations) {
        (Ok(state), Ok(conversations)) => {
            if !state.is_available().await {
                return degrade(config, format!("mongodb at {} not reachable", url));
            }
            StoreHandle {
                state: Arc::new(state),
                conversations: Arc::new(conversations),
                mode: StoreMode::Primary,
            }
        }
        (Err(e), _) | (_, Err(e)) => degrade(config, format!("mongodb connect failed: {}", e)),
    }
}

#[cfg(not(feature = "store-mongodb"))]
async fn connect_mongodb(config: &StateConfig) -> StoreHandle {
    degrade(
        config,
        "mongodb provider requires the store-mongodb feature".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::RunState;

    #[tokio::test]
    async fn test_memory_provider_is_primary() {
        let handle = connect(&StateConfig::memory(None)).await;
        assert_eq!(handle.mode, StoreMode::Primary);
        assert_eq!(handle.state.provider_name(), "memory");
    }

    #[tokio::test]
    async fn test_file_provider_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let handle = connect(&StateConfig::file(dir.path())).await;
        assert_eq!(handle.mode, StoreMode::Primary);
        assert_eq!(handle.state.provider_name(), "file");

        handle
            .state
            .set(RunState::new("run-1", vec![]))
            .await
            .unwrap();
        assert!(handle.state.get("run-1").await.is_ok());
    }

    #[tokio::test]
    async fn test_unusable_file_path_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("occupied");
        std::fs::write(&blocker, "not a directory").unwrap();

        let handle = connect(&StateConfig::file(&blocker)).await;
        assert!(handle.mode.is_degraded());
        assert_eq!(handle.state.provider_name(), "memory");

        // Degraded store still works
        handle
            .state
            .set(RunState::new("run-1", vec![]))
            .await
            .unwrap();
        assert!(handle.state.get("run-1").await.is_ok());
    }

    #[cfg(not(feature = "store-mongodb"))]
    #[tokio::test]
    async fn test_mongodb_without_feature_degrades() {
        let config = StateConfig {
            provider: StoreProvider::Mongodb,
            url: Some("mongodb://localhost:27017".to_string()),
            ..StateConfig::default()
        };
        let handle = connect(&config).await;
        match handle.mode {
            StoreMode::Degraded { reason } => assert!(reason.contains("store-mongodb")),
            StoreMode::Primary => panic!("expected degraded mode"),
        }
    }

    #[cfg(feature = "store-mongodb")]
    #[tokio::test]
    async fn test_mongodb_without_url_degrades() {
        let config = StateConfig {
            provider: StoreProvider::Mongodb,
            ..StateConfig::default()
        };
        let handle = connect(&config).await;
        assert!(handle.mode.is_degraded());
    }
}
