//! Pluggable persistence for run state and conversations.
//!
//! Two logical stores share one provider configuration: [`StateStore`] holds
//! run-level checkpoints keyed by run id, [`ConversationStore`] holds the
//! user-facing conversation records. Three providers implement both:
//!
//! - **memory** - in-process, volatile
//! - **file** - local JSON tables with atomic writes
//! - **mongodb** - networked document store (feature `store-mongodb`)
//!
//! [`connect`] builds both stores from a [`StateConfig`] and never fails: an
//! unusable provider degrades to the in-process store, and the returned
//! [`StoreMode`] says which one you actually got.
//!
//! ```
//! use ace::store::{connect, StateConfig, StoreMode};
//!
//! # tokio_test::block_on(async {
//! let handle = connect(&StateConfig::default()).await;
//! assert_eq!(handle.mode, StoreMode::Primary);
//! assert_eq!(handle.state.provider_name(), "memory");
//! # });
//! ```

mod atomic;
mod factory;
mod file_backend;
mod memory_backend;
mod models;
#[cfg(feature = "store-mongodb")]
pub(crate) mod mongodb_backend;
mod traits;

pub use atomic::AtomicFileWriter;
pub use factory::{connect, StoreHandle};
pub use file_backend::{FileConversationStore, FileStateStore};
pub use memory_backend::{MemoryConversationStore, MemoryStateStore};
pub(crate) use models::expired;
pub use models::{
    Conversation, PendingApprovalRecord, RunState, StateConfig, StoreMode, StoreProvider,
};
#[cfg(feature = "store-mongodb")]
pub use mongodb_backend::{MongoConversationStore, MongoStateStore};
pub use traits::{ConversationStore, StateStore, StoreError, StoreResult};
