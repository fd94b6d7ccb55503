//! Persisted data models and provider configuration.

use crate::message::Message;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Run-level checkpoint, distinct from the conversation record.
///
/// Holds the message window a resumed run would need. The store assigns
/// `updated_at` on every `set`; callers should not rely on the value they
/// pass in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Run this checkpoint belongs to.
    pub run_id: String,
    /// Message window at checkpoint time.
    pub messages: Vec<Message>,
    /// When the store last wrote this record.
    pub updated_at: DateTime<Utc>,
}

impl RunState {
    /// Create a checkpoint for the given run.
    pub fn new(run_id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            run_id: run_id.into(),
            messages,
            updated_at: Utc::now(),
        }
    }
}

/// A pending approval as mirrored onto the conversation record.
///
/// The live resolver stays in the coordinator's in-process registry; this
/// mirror exists so a reconnecting or restarted client can still display the
/// outstanding request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApprovalRecord {
    /// Approval id the resolver must present.
    pub approval_id: String,
    /// Run that requested the approval.
    pub run_id: String,
    /// Tool awaiting approval.
    pub tool: String,
    /// Input snapshot shown to the approver.
    pub input: serde_json::Value,
    /// When the approval was requested.
    pub requested_at: DateTime<Utc>,
}

/// The persisted, multi-run chat history a user interacts with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation id.
    pub id: String,
    /// Owning identity; authorizes listing, approval resolution, deletion.
    pub owner_id: String,
    /// Display title.
    pub title: String,
    /// Full ordered message history.
    pub messages: Vec<Message>,
    /// Most recent run started on this conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_id: Option<String>,
    /// Mirror of the approvals currently awaiting a decision.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_approvals: Vec<PendingApprovalRecord>,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a conversation with a fresh id for the given owner.
    pub fn new(owner_id: impl Into<String>, title: Option<&str>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), owner_id, title)
    }

    /// Create a conversation with a caller-chosen id.
    pub fn with_id(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        title: Option<&str>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            title: title.unwrap_or("New conversation").to_string(),
            messages: Vec::new(),
            last_run_id: None,
            pending_approvals: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Which persistence provider to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    /// In-process, volatile.
    Memory,
    /// Local filesystem, durable.
    File,
    /// Networked document store (requires the `store-mongodb` feature).
    Mongodb,
}

impl Default for StoreProvider {
    fn default() -> Self {
        Self::Memory
    }
}

impl std::fmt::Display for StoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::File => write!(f, "file"),
            Self::Mongodb => write!(f, "mongodb"),
        }
    }
}

/// Provider selection and connection parameters.
///
/// One config covers both logical stores (run state and conversations).
/// `ttl`, when set, is enforced identically by every provider, including the
/// in-process fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Provider selector.
    #[serde(default)]
    pub provider: StoreProvider,
    /// Time-to-live in seconds; expired records read as missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    /// Connection URL for networked providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Credential for networked providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Namespace (database name) for networked providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Deployment region hint for networked providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Base directory for the file provider. Defaults to `./state`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StateConfig {
    /// A memory-provider config with the given ttl.
    pub fn memory(ttl: Option<u64>) -> Self {
        Self {
            provider: StoreProvider::Memory,
            ttl,
            ..Self::default()
        }
    }

    /// A file-provider config rooted at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            provider: StoreProvider::File,
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Base directory for the file provider.
    pub fn file_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| PathBuf::from("./state"))
    }
}

/// Which store the factory actually handed back.
///
/// `Degraded` means the configured provider was unusable and the in-process
/// store is standing in; the host can surface that instead of discovering it
/// from missing data later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreMode {
    /// The configured provider is in use.
    Primary,
    /// The in-process fallback is in use.
    Degraded {
        /// Why the configured provider was not usable.
        reason: String,
    },
}

impl StoreMode {
    /// Whether the fallback store is in use.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Whether a record written at `updated_at` has outlived `ttl` seconds.
pub(crate) fn expired(updated_at: DateTime<Utc>, ttl: Option<u64>) -> bool {
    match ttl {
        Some(seconds) => Utc::now() - updated_at > Duration::seconds(seconds as i64),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_defaults() {
        let conversation = Conversation::new("owner-1", None);
        assert_eq!(conversation.title, "New conversation");
        assert!(conversation.messages.is_empty());
        assert!(conversation.pending_approvals.is_empty());
        assert!(!conversation.id.is_empty());

        let titled = Conversation::new("owner-1", Some("Deploy help"));
        assert_eq!(titled.title, "Deploy help");
    }

    #[test]
    fn test_state_config_provider_serde() {
        let config: StateConfig = toml::from_str("provider = \"file\"\npath = \"/tmp/acestate\"")
            .expect("parse state config");
        assert_eq!(config.provider, StoreProvider::File);
        assert_eq!(config.file_path(), PathBuf::from("/tmp/acestate"));

        let config: StateConfig = toml::from_str("").expect("empty config");
        assert_eq!(config.provider, StoreProvider::Memory);
        assert_eq!(config.file_path(), PathBuf::from("./state"));
    }

    #[test]
    fn test_expiry_helper() {
        let fresh = Utc::now();
        assert!(!expired(fresh, Some(60)));
        assert!(!expired(fresh - Duration::seconds(3600), None));
        assert!(expired(fresh - Duration::seconds(2), Some(1)));
    }

    #[test]
    fn test_store_mode() {
        assert!(!StoreMode::Primary.is_degraded());
        assert!(StoreMode::Degraded {
            reason: "unreachable".to_string()
        }
        .is_degraded());
    }
}
