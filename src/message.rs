//! Conversation message types shared by the model boundary, the run engine,
//! and the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End-user input.
    User,
    /// Model output.
    Assistant,
    /// Tool results fed back to the model.
    Tool,
}

impl Role {
    /// String form used in wire payloads and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in a conversation.
///
/// Messages are an ordered, append-only sequence within a run; the
/// persistence layer always replaces the full sequence rather than appending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the message.
    pub role: Role,
    /// Text content. For tool messages this is the serialized batch of
    /// tool_result payloads for one step.
    pub content: String,
    /// Optional annotations (timestamp, tool activity timeline).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            metadata: None,
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            metadata: None,
        }
    }

    /// Create a tool-result message.
    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            metadata: None,
        }
    }

    /// Attach metadata, replacing any existing.
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Annotations carried alongside a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// When the message was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Tool activity recorded while the step that produced this message ran.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_timeline: Vec<ToolTimelineEntry>,
}

impl MessageMetadata {
    /// Metadata stamped with the current time.
    pub fn now() -> Self {
        Self {
            timestamp: Some(Utc::now()),
            tool_timeline: Vec::new(),
        }
    }
}

/// One tool's outcome within a step, for inline timeline rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolTimelineEntry {
    /// Tool name.
    pub tool: String,
    /// Outcome of the invocation.
    pub status: TimelineStatus,
    /// Error or denial detail when the status is not `Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Wall-clock duration in milliseconds, when the tool actually ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Outcome classes shown in a message's tool timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineStatus {
    /// Handler ran and returned output.
    Completed,
    /// Handler failed or the tool was unknown.
    Error,
    /// A human denied the approval request.
    Denied,
}
