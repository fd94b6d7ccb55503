//! Configuration loading for agent hosts.
//!
//! Settings come from a TOML file where every field has a default, so a
//! missing or partial file still yields a working configuration. A `.env`
//! file plus a few `ACE_*` variables override the deploy-time values that do
//! not belong in version control.
//!
//! # Example
//!
//! ```no_run
//! use ace::config::{EnvironmentLoader, Settings};
//!
//! let env = EnvironmentLoader::new(None);
//! let mut settings = Settings::load(None).unwrap();
//! settings.apply_environment(&env);
//!
//! println!("Agent: {}", settings.agent.id);
//! println!("Max steps: {}", settings.execution.max_steps);
//! ```

pub mod environment;
pub mod settings;

pub use self::environment::EnvironmentLoader;
pub use self::settings::{
    AgentSettings, ExecutionSettings, LoggingSettings, ModelSettings, Settings,
};
