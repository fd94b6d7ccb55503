//! File-backed store providers.
//!
//! One JSON file per logical store under a base directory. Every write
//! rewrites the full table through [`AtomicFileWriter`], and all writes to a
//! given file go through one async mutex, so concurrent updates serialize
//! instead of interleaving.

use crate::store::atomic::AtomicFileWriter;
use crate::store::models::{expired, Conversation, RunState};
use crate::store::traits::{ConversationStore, StateStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const STATE_FILE: &str = "run_state.json";
const CONVERSATIONS_FILE: &str = "conversations.json";

fn load_table<T: DeserializeOwned>(path: &Path) -> StoreResult<HashMap<String, T>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| StoreError::Serialization(e.to_string()))
}

async fn persist_table<T: Serialize>(path: &Path, table: &HashMap<String, T>) -> StoreResult<()> {
    AtomicFileWriter::new(path)?.write_json(table).await
}

/// File-backed run-state store.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, RunState>>,
    ttl: Option<u64>,
}

impl FileStateStore {
    /// Open (or initialize) the store under `base_dir`.
    pub fn open(base_dir: impl Into<PathBuf>, ttl: Option<u64>) -> StoreResult<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        let path = base_dir.join(STATE_FILE);
        let entries = load_table(&path)?;

        Ok(Self {
            path,
            entries: Mutex::new(entries),
            ttl,
        })
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    fn provider_name(&self) -> &'static str {
        "file"
    }

    async fn is_available(&self) -> bool {
        self.path.parent().map(|p| p.exists()).unwrap_or(false)
    }

    async fn get(&self, run_id: &str) -> StoreResult<RunState> {
        let mut entries = self.entries.lock().await;
        match entries.get(run_id) {
            Some(state) if expired(state.updated_at, self.ttl) => {
                // Dropped lazily; the next write rewrites the file without it
                entries.remove(run_id);
                Err(StoreError::NotFound(run_id.to_string()))
            }
            Some(state) => Ok(state.clone()),
            None => Err(StoreError::NotFound(run_id.to_string())),
        }
    }

    async fn set(&self, mut state: RunState) -> StoreResult<()> {
        state.updated_at = Utc::now();
        let mut entries = self.entries.lock().await;
        entries.insert(state.run_id.clone(), state);
        persist_table(&self.path, &entries).await
    }

    async fn delete(&self, run_id: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(run_id).is_some() {
            persist_table(&self.path, &entries).await?;
        }
        Ok(())
    }
}

/// File-backed conversation store.
#[derive(Debug)]
pub struct FileConversationStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, Conversation>>,
    ttl: Option<u64>,
}

impl FileConversationStore {
    /// Open (or initialize) the store under `base_dir`.
    pub fn open(base_dir: impl Into<PathBuf>, ttl: Option<u64>) -> StoreResult<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        let path = base_dir.join(CONVERSATIONS_FILE);
        let entries = load_table(&path)?;

        Ok(Self {
            path,
            entries: Mutex::new(entries),
            ttl,
        })
    }
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    fn provider_name(&self) -> &'static str {
        "file"
    }

    async fn is_available(&self) -> bool {
        self.path.parent().map(|p| p.exists()).unwrap_or(false)
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
        let mut entries = self.entries.lock().await;
        entries.insert(conversation.id.clone(), conversation.clone());
        persist_table(&self.path, &entries).await?;
        Ok(conversation)
    }

    async fn update(&self, conversation: &Conversation) -> StoreResult<()> {
        let mut stored = conversation.clone();
        stored.updated_at = Utc::now();
        let mut entries = self.entries.lock().await;
        entries.insert(stored.id.clone(), stored);
        persist_table(&self.path, &entries).await
    }

    async fn rename(&self, id: &str, title: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        let conversation = entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        conversation.title = title.to_string();
        conversation.updated_at = Utc::now();
        persist_table(&self.path, &entries).await
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(id).is_some() {
            persist_table(&self.path, &entries).await?;
        }
        Ok(())
    }
}
