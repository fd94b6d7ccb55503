//! The agent run engine.
//!
//! A run is one execution of the step loop: call the model, optionally
//! execute the tools it requested (gating sensitive ones behind a human
//! approval), feed the results back, repeat until the model answers without
//! tools or a budget runs out. [`RunEngine::spawn`] starts a run on its own
//! tokio task and returns a [`RunHandle`] whose channel yields one
//! [`AgentEvent`] per state transition, ending with a terminal
//! `run:completed`, `run:error`, or `run:cancelled`.
//!
//! ```ignore
//! let engine = RunEngine::new(client, dispatcher, gate, EngineConfig::default());
//! let mut handle = engine.spawn(RunInput::new("What is 2 + 2?"));
//! while let Some(event) = handle.events.recv().await {
//!     println!("{}", event.sse_frame());
//! }
//! ```

mod approval;
mod events;
mod run;
mod transcript;

pub use approval::{ApprovalDecision, ApprovalGate, ApprovalRequest, AutoApprovalGate};
pub use events::{AgentEvent, RunErrorCode, RunErrorInfo, RunResult, RunStatus};
pub use run::{EngineConfig, RunEngine, RunHandle, RunInput};
pub use transcript::Transcript;
