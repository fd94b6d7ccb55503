//! Environment variable loading.
//!
//! The crate honors a small set of `ACE_*` variables for deploy-time values
//! that do not belong in a checked-in settings file: the model name and the
//! store connection secrets.

use std::env;
use std::path::Path;

/// Loads environment variables from a `.env` file and the process
/// environment.
#[derive(Debug, Clone)]
pub struct EnvironmentLoader {
    #[allow(dead_code)]
    env_file: Option<String>,
}

impl EnvironmentLoader {
    /// Initialize the environment loader.
    ///
    /// # Arguments
    /// * `env_file` - Path to a `.env` file. If None, no file is loaded.
    pub fn new(env_file: Option<&Path>) -> Self {
        // Only load a .env file when an explicit path was provided. This
        // avoids picking up repository or system .env files during unit
        // tests which expect default values.
        if let Some(path) = env_file {
            if path.exists() {
                if let Err(e) = dotenv::from_path(path) {
                    eprintln!("Warning: Failed to load .env file: {}", e);
                }
            }
        }

        Self {
            env_file: env_file.map(|p| p.to_string_lossy().to_string()),
        }
    }

    /// Model name override from `ACE_MODEL`.
    pub fn model(&self) -> Option<String> {
        env::var("ACE_MODEL").ok()
    }

    /// Store connection URL from `ACE_STATE_URL`.
    pub fn state_url(&self) -> Option<String> {
        env::var("ACE_STATE_URL").ok()
    }

    /// Store credential from `ACE_STATE_TOKEN`.
    pub fn state_token(&self) -> Option<String> {
        env::var("ACE_STATE_TOKEN").ok()
    }
}

impl Default for EnvironmentLoader {
    fn default() -> Self {
        Self::new(None)
    }
}
