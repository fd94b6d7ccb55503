//! Tool source types for identifying where a tool originated.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the origin of a tool definition.
///
/// The dispatcher treats all tools the same at execution time; the source
/// is carried for listing, logging, and host-side routing decisions.
///
/// # Example
///
/// ```
/// use ace::tool::ToolSource;
///
/// let source = ToolSource::Native;
/// assert_eq!(source.to_string(), "native");
///
/// let source = ToolSource::Memory;
/// assert_eq!(source.to_string(), "memory");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolSource {
	/// Tool registered directly by the host process.
	///
	/// These run in-process through their registered handler.
	Native,

	/// Built-in tool backed by the agent memory store.
	///
	/// Registered by the memory module (`memory_recall`, `memory_append`).
	Memory,

	/// Tool bridged in from an external system.
	///
	/// The handler proxies to something outside this process; the
	/// dispatcher still owns cancellation and timing.
	Remote,
}

impl fmt::Display for ToolSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Native => write!(f, "native"),
			Self::Memory => write!(f, "memory"),
			Self::Remote => write!(f, "remote"),
		}
	}
}

impl Default for ToolSource {
	fn default() -> Self {
		Self::Native
	}
}
