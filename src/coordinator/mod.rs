//! Multi-conversation run coordination.
//!
//! The [`ConversationCoordinator`] sits between a host application (an HTTP
//! handler, a chat gateway) and the run engine. It enforces one active run
//! per conversation, seeds each run from the conversation's stored history,
//! checkpoints progress after every step, buffers events so observers can
//! reconnect mid-run, and routes approval decisions back to the run that is
//! waiting on them.
//!
//! ```ignore
//! let coordinator = ConversationCoordinator::new(client, tools, store, config, None);
//! let mut started = coordinator.start_run("conv-1", "user-1", "Summarize the logs").await?;
//! while let Some(event) = started.events.recv().await {
//!     if event.is_approval() {
//!         // surface to the user; later:
//!         // coordinator.resolve_approval("user-1", &approval_id, true).await?;
//!     }
//! }
//! ```

mod buffer;
mod error;
mod runs;

pub use error::{CoordinatorError, CoordinatorResult};
pub use runs::{ConversationCoordinator, StartedRun};
