//! Agent Conversation Engine (ACE) - feature-gated building blocks for
//! multi-step, tool-using agent runs.
//!
//! ACE provides the pieces between a chat-shaped host application and a
//! language model:
//!
//! - **`message`** - Conversation messages and tool-activity metadata
//! - **`config`** - TOML settings and environment loading
//! - **`observability`** - Markdown run logging
//! - **`provider`** - The consumed model boundary (`generate` + streaming)
//! - **`tool`** - Tool definitions, dispatch, and cancellation
//! - **`store`** - Pluggable run-state and conversation persistence
//! - **`memory`** - Long-lived agent memory exposed as tools
//! - **`engine`** - The per-run step loop with approval gating
//! - **`coordinator`** - One-run-per-conversation lifecycle management
//!
//! # Features
//!
//! Enable the features you need in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! ace = { version = "0.4", features = ["engine"] }
//! # Or enable multiple features:
//! ace = { version = "0.4", features = ["coordinator", "memory"] }
//! # Or enable everything:
//! ace = { version = "0.4", features = ["full"] }
//! ```
//!
//! The `store-mongodb` feature adds the networked storage provider and is
//! not part of `full`.
//!
//! # Example: Running a single task
//!
//! ```ignore
//! use ace::engine::{AutoApprovalGate, EngineConfig, RunEngine, RunInput};
//! use std::sync::Arc;
//!
//! let engine = RunEngine::new(
//!     client,
//!     Arc::new(dispatcher),
//!     Arc::new(AutoApprovalGate::approve_all()),
//!     EngineConfig::default(),
//! );
//! let mut handle = engine.spawn(RunInput::new("What is 2 + 2?"));
//! while let Some(event) = handle.events.recv().await {
//!     println!("{}", event.sse_frame());
//! }
//! ```
//!
//! # Example: Coordinating conversations
//!
//! ```ignore
//! use ace::coordinator::ConversationCoordinator;
//! use ace::store::{connect, StateConfig};
//!
//! let store = connect(&StateConfig::default()).await;
//! let coordinator = ConversationCoordinator::new(client, dispatcher, store, config, None);
//!
//! let mut started = coordinator.start_run("conv-1", "user-1", "Summarize the logs").await?;
//! while let Some(event) = started.events.recv().await {
//!     println!("{}", event.kind());
//! }
//! ```

#![warn(missing_docs)]

/// Conversation messages (enabled with the `message` feature)
#[cfg(feature = "message")]
pub mod message;

/// Configuration management (enabled with the `config` feature)
#[cfg(feature = "config")]
pub mod config;

/// Observability utilities (enabled with the `observability` feature)
#[cfg(feature = "observability")]
pub mod observability;

/// Model client abstraction (enabled with the `provider` feature)
#[cfg(feature = "provider")]
pub mod provider;

/// Tool definitions and dispatch (enabled with the `tool` feature)
#[cfg(feature = "tool")]
pub mod tool;

/// Run-state and conversation persistence (enabled with the `store` feature)
#[cfg(feature = "store")]
pub mod store;

/// Long-lived agent memory (enabled with the `memory` feature)
#[cfg(feature = "memory")]
pub mod memory;

/// The agent run engine (enabled with the `engine` feature)
#[cfg(feature = "engine")]
pub mod engine;

/// Multi-conversation run coordination (enabled with the `coordinator` feature)
#[cfg(feature = "coordinator")]
pub mod coordinator;

/// Prelude module for convenient imports
pub mod prelude {
    #[cfg(feature = "message")]
    pub use crate::message::{Message, MessageMetadata, Role, TimelineStatus, ToolTimelineEntry};

    #[cfg(feature = "config")]
    pub use crate::config::{EnvironmentLoader, Settings};

    #[cfg(feature = "observability")]
    pub use crate::observability::RunLogger;

    #[cfg(feature = "provider")]
    pub use crate::provider::{
        ModelClient, ModelRequest, ModelResponse, StreamChunk, TokenUsage, ToolInvocation,
        ToolSchema,
    };

    #[cfg(feature = "tool")]
    pub use crate::tool::{
        ToolCall, ToolContext, ToolDefinition, ToolDispatcher, ToolError, ToolExecutionResult,
        ToolHandler, ToolSource,
    };

    #[cfg(feature = "store")]
    pub use crate::store::{
        connect, Conversation, RunState, StateConfig, StoreHandle, StoreMode, StoreProvider,
    };

    #[cfg(feature = "memory")]
    pub use crate::memory::{memory_tools, MainMemory, MemoryStore, RecallHit};

    #[cfg(feature = "engine")]
    pub use crate::engine::{
        AgentEvent, ApprovalDecision, ApprovalGate, AutoApprovalGate, EngineConfig, RunEngine,
        RunHandle, RunInput, RunResult, RunStatus,
    };

    #[cfg(feature = "coordinator")]
    pub use crate::coordinator::{ConversationCoordinator, CoordinatorError, StartedRun};
}
