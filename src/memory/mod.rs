//! Long-lived agent memory with keyword recall.
//!
//! Conversations end; memory persists. [`MemoryStore`] keeps one
//! [`MainMemory`] document per agent identity in a pluggable
//! [`MemoryBackend`] (in-process, file, or MongoDB), and
//! [`memory_tools`] wraps it as two tool definitions the model can call
//! during a run:
//!
//! - `memory_recall { query, limit? }` - scored entries, most relevant first
//! - `memory_append { content }` - persist a new entry
//!
//! Recall scores entries by keyword overlap (whole-phrase matches outrank
//! scattered token hits) and breaks ties toward newer entries.
//!
//! ```
//! use ace::memory::MemoryStore;
//!
//! # tokio_test::block_on(async {
//! let memory = MemoryStore::in_memory();
//! memory.append("agent-1", "user prefers terse answers").await.unwrap();
//!
//! let hits = memory.recall("agent-1", "terse", 5).await.unwrap();
//! assert_eq!(hits.len(), 1);
//! # });
//! ```

#[cfg(feature = "store-mongodb")]
mod mongodb;
mod store;
mod tools;

#[cfg(feature = "store-mongodb")]
pub use mongodb::MongoMemoryBackend;
pub use store::{
    FileMemoryBackend, InMemoryBackend, MainMemory, MemoryBackend, MemoryEntry, MemoryStore,
    RecallHit,
};
pub use tools::memory_tools;
