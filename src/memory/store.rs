//! Agent memory persistence: one main-memory document per agent identity.

use crate::store::{StateConfig, StoreError, StoreMode, StoreProvider, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

const MEMORY_FILE: &str = "memory.json";

/// Weight a whole-query phrase match adds on top of per-token hits.
const PHRASE_MATCH_WEIGHT: u32 = 10;

/// One remembered note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique entry id.
    pub id: String,
    /// The note itself.
    pub content: String,
    /// When the note was appended.
    pub created_at: DateTime<Utc>,
}

impl MemoryEntry {
    /// Create an entry with a fresh id.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// The long-lived memory document for one agent identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainMemory {
    /// Agent identity this memory belongs to.
    pub agent_id: String,
    /// Remembered notes, oldest first.
    pub entries: Vec<MemoryEntry>,
    /// When the document was last written.
    pub updated_at: DateTime<Utc>,
}

impl MainMemory {
    /// An empty memory document for the given agent.
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            entries: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

/// A recalled entry with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallHit {
    /// The remembered note.
    pub content: String,
    /// When the note was appended.
    pub created_at: DateTime<Utc>,
    /// Keyword-overlap relevance score.
    pub score: u32,
}

/// Persistence boundary for memory documents.
///
/// A missing document loads as an empty one; agents have memory from their
/// first recall, it just has nothing in it yet.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// The provider name (e.g. "memory", "file", "mongodb")
    fn provider_name(&self) -> &'static str;

    /// Load an agent's memory document, empty if absent or expired.
    async fn load(&self, agent_id: &str) -> StoreResult<MainMemory>;

    /// Replace an agent's memory document, stamping `updated_at`.
    async fn save(&self, memory: &MainMemory) -> StoreResult<()>;
}

/// In-process memory backend.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    docs: Mutex<HashMap<String, MainMemory>>,
    ttl: Option<u64>,
}

impl InMemoryBackend {
    /// Create an empty backend with an optional ttl in seconds.
    pub fn new(ttl: Option<u64>) -> Self {
        Self {
            docs: Mutex::new(HashMap::new()),
            ttl,
        }
    }
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, agent_id: &str) -> StoreResult<MainMemory> {
        let mut docs = self.docs.lock().await;
        match docs.get(agent_id) {
            Some(doc) if crate::store::expired(doc.updated_at, self.ttl) => {
                docs.remove(agent_id);
                Ok(MainMemory::new(agent_id))
            }
            Some(doc) => Ok(doc.clone()),
            None => Ok(MainMemory::new(agent_id)),
        }
    }

    async fn save(&self, memory: &MainMemory) -> StoreResult<()> {
        let mut stored = memory.clone();
        stored.updated_at = Utc::now();
        self.docs
            .lock()
            .await
            .insert(stored.agent_id.clone(), stored);
        Ok(())
    }
}

/// File-backed memory backend: one JSON table keyed by agent id.
#[derive(Debug)]
pub struct FileMemoryBackend {
    path: PathBuf,
    docs: Mutex<HashMap<String, MainMemory>>,
    ttl: Option<u64>,
}

impl FileMemoryBackend {
    /// Open (or initialize) the backend under `base_dir`.
    pub fn open(base_dir: impl Into<PathBuf>, ttl: Option<u64>) -> StoreResult<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        let path = base_dir.join(MEMORY_FILE);

        let docs = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| StoreError::Serialization(e.to_string()))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            docs: Mutex::new(docs),
            ttl,
        })
    }
}

#[async_trait]
impl MemoryBackend for FileMemoryBackend {
    fn provider_name(&self) -> &'static str {
        "file"
    }

    async fn load(&self, agent_id: &str) -> StoreResult<MainMemory> {
        let mut docs = self.docs.lock().await;
        match docs.get(agent_id) {
            Some(doc) if crate::store::expired(doc.updated_at, self.ttl) => {
                docs.remove(agent_id);
                Ok(MainMemory::new(agent_id))
            }
            Some(doc) => Ok(doc.clone()),
            None => Ok(MainMemory::new(agent_id)),
        }
    }

    async fn save(&self, memory: &MainMemory) -> StoreResult<()> {
        let mut stored = memory.clone();
        stored.updated_at = Utc::now();
        let mut docs = self.docs.lock().await;
        docs.insert(stored.agent_id.clone(), stored);
        crate::store::AtomicFileWriter::new(&self.path)?
            .write_json(&*docs)
            .await
    }
}

/// Scored, cross-conversation agent memory.
///
/// Stores one [`MainMemory`] document per agent identity through a pluggable
/// backend and answers recall queries with a keyword-overlap scorer: a
/// whole-phrase match outranks scattered token hits, each query token found
/// in an entry adds one, ties break toward newer entries.
#[derive(Clone)]
pub struct MemoryStore {
    backend: Arc<dyn MemoryBackend>,
}

impl MemoryStore {
    /// A store over the given backend.
    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self { backend }
    }

    /// An in-process store. Handy for tests and defaults.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new(None)))
    }

    /// Build the store described by `config`, degrading like
    /// [`store::connect`](crate::store::connect) does.
    pub async fn connect(config: &StateConfig) -> (Self, StoreMode) {
        let degrade = |reason: String| {
            warn!(
                target: "ace::memory",
                provider = %config.provider,
                reason = %reason,
                "configured memory store unusable, falling back to in-process store"
            );
            (
                Self::new(Arc::new(InMemoryBackend::new(config.ttl))),
                StoreMode::Degraded { reason },
            )
        };

        match config.provider {
            StoreProvider::Memory => (
                Self::new(Arc::new(InMemoryBackend::new(config.ttl))),
                StoreMode::Primary,
            ),
            StoreProvider::File => match FileMemoryBackend::open(config.file_path(), config.ttl) {
                Ok(backend) => (Self::new(Arc::new(backend)), StoreMode::Primary),
                Err(e) => degrade(format!(
                    "file memory store at {} unusable: {}",
                    config.file_path().display(),
                    e
                )),
            },
            StoreProvider::Mongodb => Self::connect_mongodb(config, degrade).await,
        }
    }

    #[cfg(feature = "store-mongodb")]
    async fn connect_mongodb(
        config: &StateConfig,
        degrade: impl Fn(String) -> (Self, StoreMode),
    ) -> (Self, StoreMode) {
        let url = match &config.url {
            Some(url) => url.clone(),
            None => return degrade("mongodb provider configured without url".to_string()),
        };
        let database = config.table.clone().unwrap_or_else(|| "ace".to_string());
        match super::mongodb::MongoMemoryBackend::connect(&url, &database, config.ttl).await {
            Ok(backend) => (Self::new(Arc::new(backend)), StoreMode::Primary),
            Err(e) => degrade(format!("mongodb connect failed: {}", e)),
        }
    }

    #[cfg(not(feature = "store-mongodb"))]
    async fn connect_mongodb(
        _config: &StateConfig,
        degrade: impl Fn(String) -> (Self, StoreMode),
    ) -> (Self, StoreMode) {
        degrade("mongodb provider requires the store-mongodb feature".to_string())
    }

    /// The entries most relevant to `query`, best first, at most `limit`.
    pub async fn recall(
        &self,
        agent_id: &str,
        query: &str,
        limit: usize,
    ) -> StoreResult<Vec<RecallHit>> {
        let memory = self.backend.load(agent_id).await?;

        let mut hits: Vec<(u32, MemoryEntry)> = memory
            .entries
            .into_iter()
            .filter_map(|entry| {
                let score = score_entry(&entry.content, query);
                (score > 0).then_some((score, entry))
            })
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.created_at.cmp(&a.1.created_at)));
        hits.truncate(limit);

        Ok(hits
            .into_iter()
            .map(|(score, entry)| RecallHit {
                content: entry.content,
                created_at: entry.created_at,
                score,
            })
            .collect())
    }

    /// Append a note to an agent's memory and persist it.
    pub async fn append(&self, agent_id: &str, content: &str) -> StoreResult<MemoryEntry> {
        let mut memory = self.backend.load(agent_id).await?;
        let entry = MemoryEntry::new(content);
        memory.entries.push(entry.clone());
        self.backend.save(&memory).await?;
        Ok(entry)
    }

    /// The provider actually backing this store.
    pub fn provider_name(&self) -> &'static str {
        self.backend.provider_name()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("provider", &self.backend.provider_name())
            .finish()
    }
}

/// Keyword-overlap relevance of one entry against a query.
fn score_entry(content: &str, query: &str) -> u32 {
    let content = content.to_lowercase();
    let query = query.to_lowercase();
    let query = query.trim();
    if query.is_empty() {
        return 0;
    }

    let mut score = 0;
    if content.contains(query) {
        score += PHRASE_MATCH_WEIGHT;
    }
    for token in query.split_whitespace() {
        if content.contains(token) {
            score += 1;
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_then_recall() {
        let store = MemoryStore::in_memory();
        store
            .append("agent-1", "The deploy password is in vault path ops/deploy")
            .await
            .unwrap();
        store
            .append("agent-1", "User prefers terse answers")
            .await
            .unwrap();

        let hits = store.recall("agent-1", "deploy vault", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("vault"));
    }

    #[tokio::test]
    async fn test_phrase_match_outranks_token_overlap() {
        let store = MemoryStore::in_memory();
        store
            .append("agent-1", "staging database lives on host db-2")
            .await
            .unwrap();
        store
            .append("agent-1", "production database migration steps")
            .await
            .unwrap();

        let hits = store
            .recall("agent-1", "production database", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].content.starts_with("production"));
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_ties_break_toward_newer_entries() {
        let store = MemoryStore::in_memory();
        store.append("agent-1", "note about kubernetes").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store
            .append("agent-1", "kubernetes note, revised")
            .await
            .unwrap();

        let hits = store.recall("agent-1", "kubernetes", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].score, hits[1].score);
        assert!(hits[0].content.contains("revised"));
    }

    #[tokio::test]
    async fn test_memories_are_per_agent() {
        let store = MemoryStore::in_memory();
        store.append("agent-1", "alpha detail").await.unwrap();

        let hits = store.recall("agent-2", "alpha", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_recall_limit() {
        let store = MemoryStore::in_memory();
        for i in 0..10 {
            store
                .append("agent-1", &format!("kafka partition note {}", i))
                .await
                .unwrap();
        }

        let hits = store.recall("agent-1", "kafka", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_file_backend_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = FileMemoryBackend::open(dir.path(), None).unwrap();
            let store = MemoryStore::new(Arc::new(backend));
            store.append("agent-1", "durable note").await.unwrap();
        }

        let backend = FileMemoryBackend::open(dir.path(), None).unwrap();
        let store = MemoryStore::new(Arc::new(backend));
        let hits = store.recall("agent-1", "durable", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_connect_degrades_without_mongodb_url() {
        let config = StateConfig {
            provider: StoreProvider::Mongodb,
            ..StateConfig::default()
        };
        let (store, mode) = MemoryStore::connect(&config).await;
        assert!(mode.is_degraded());
        assert_eq!(store.provider_name(), "memory");
    }
}
