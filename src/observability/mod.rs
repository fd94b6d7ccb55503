//! Observability utilities for agent runs.
//!
//! Structured diagnostics go through `tracing` at the call sites that have
//! something to say; this module adds the human-readable side, a markdown
//! [`RunLogger`] that accumulates run headers, events, and model exchanges
//! in one file.
//!
//! # Example
//!
//! ```no_run
//! use ace::observability::RunLogger;
//!
//! let logger = RunLogger::new(None, Some("DEBUG")).unwrap();
//! logger.log_run_start("run-1", "support-agent", "Summarize the logs").unwrap();
//! logger.log_run_end("run-1", "completed", 1).unwrap();
//! ```

pub mod logger;

pub use logger::RunLogger;
