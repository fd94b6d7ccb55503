//! In-process store providers.
//!
//! Volatile, per-process storage. This is both a first-class provider and
//! the fallback every networked provider degrades to, so it honors the same
//! ttl semantics as the durable ones.

use crate::store::models::{expired, Conversation, RunState};
use crate::store::traits::{ConversationStore, StateStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-process run-state store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, RunState>>,
    ttl: Option<u64>,
}

impl MemoryStateStore {
    /// Create an empty store with an optional ttl in seconds.
    pub fn new(ttl: Option<u64>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn get(&self, run_id: &str) -> StoreResult<RunState> {
        let mut entries = self.entries.lock().await;
        match entries.get(run_id) {
            Some(state) if expired(state.updated_at, self.ttl) => {
                entries.remove(run_id);
                Err(StoreError::NotFound(run_id.to_string()))
            }
            Some(state) => Ok(state.clone()),
            None => Err(StoreError::NotFound(run_id.to_string())),
        }
    }

    async fn set(&self, mut state: RunState) -> StoreResult<()> {
        state.updated_at = Utc::now();
        self.entries
            .lock()
            .await
            .insert(state.run_id.clone(), state);
        Ok(())
    }

    async fn delete(&self, run_id: &str) -> StoreResult<()> {
        self.entries.lock().await.remove(run_id);
        Ok(())
    }
}

/// In-process conversation store.
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    entries: Mutex<HashMap<String, Conversation>>,
    ttl: Option<u64>,
}

impl MemoryConversationStore {
    /// Create an empty store with an optional ttl in seconds.
    pub fn new(ttl: Option<u64>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn list(&self, owner_id: &str) -> StoreResult<Vec<Conversation>> {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, c| !expired(c.updated_at, self.ttl));

        let mut owned: Vec<Conversation> = entries
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(owned)
    }

    async fn get(&self, id: &str) -> StoreResult<Conversation> {
        let mut entries = self.entries.lock().await;
        match entries.get(id) {
            Some(conversation) if expired(conversation.updated_at, self.ttl) => {
                entries.remove(id);
                Err(StoreError::NotFound(id.to_string()))
            }
            Some(conversation) => Ok(conversation.clone()),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn create(&self, owner_id: &str, title: Option<&str>) -> StoreResult<Conversation> {
        let conversation = Conversation::new(owner_id, title);
        self.entries
            .lock()
            .await
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn update(&self, conversation: &Conversation) -> StoreResult<()> {
        let mut stored = conversation.clone();
        stored.updated_at = Utc::now();
        self.entries.lock().await.insert(stored.id.clone(), stored);
        Ok(())
    }

    async fn rename(&self, id: &str, title: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        let conversation = entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        conversation.title = title.to_string();
        conversation.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.entries.lock().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use std::time::Duration;

    #[tokio::test]
    async fn test_state_round_trip() {
        let store = MemoryStateStore::new(None);
        let state = RunState::new("run-1", vec![Message::user("hello")]);
        store.set(state.clone()).await.unwrap();

        let loaded = store.get("run-1").await.unwrap();
        assert_eq!(loaded.run_id, "run-1");
        assert_eq!(loaded.messages, state.messages);

        store.delete("run-1").await.unwrap();
        assert!(matches!(
            store.get("run-1").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_state_ttl_expiry_on_read() {
        let store = MemoryStateStore::new(Some(1));
        store
            .set(RunState::new("run-1", vec![Message::user("hi")]))
            .await
            .unwrap();

        assert!(store.get("run-1").await.is_ok());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(matches!(
            store.get("run-1").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_conversation_crud() {
        let store = MemoryConversationStore::new(None);
        let created = store.create("owner-1", Some("First")).await.unwrap();

        let mut conversation = store.get(&created.id).await.unwrap();
        conversation.messages.push(Message::user("hello"));
        store.update(&conversation).await.unwrap();

        store.rename(&created.id, "Renamed").await.unwrap();
        let loaded = store.get(&created.id).await.unwrap();
        assert_eq!(loaded.title, "Renamed");
        assert_eq!(loaded.messages.len(), 1);

        store.delete(&created.id).await.unwrap();
        assert!(store.get(&created.id).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters_by_owner_and_sorts() {
        let store = MemoryConversationStore::new(None);
        let first = store.create("owner-1", Some("older")).await.unwrap();
        store.create("owner-2", Some("other owner")).await.unwrap();
        let second = store.create("owner-1", Some("newer")).await.unwrap();

        // Touch the second one so it sorts first
        let mut conversation = store.get(&second.id).await.unwrap();
        conversation.messages.push(Message::user("bump"));
        store.update(&conversation).await.unwrap();

        let listed = store.list("owner-1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn test_rename_missing_conversation() {
        let store = MemoryConversationStore::new(None);
        assert!(matches!(
            store.rename("nope", "title").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
