//! TOML settings parsing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "store")]
use crate::store::StateConfig;

/// Agent identity settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Identity runs execute under.
    #[serde(default = "default_agent_id")]
    pub id: String,
    /// System prompt sent with every model call.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Working directory handed to tool handlers.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
}

fn default_agent_id() -> String {
    "agent".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful agent.".to_string()
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            id: default_agent_id(),
            system_prompt: default_system_prompt(),
            working_dir: default_working_dir(),
        }
    }
}

/// Execution budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Step budget per run.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Wall-clock budget per run, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Retries per model call on transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// How many trailing messages the model sees per call.
    #[serde(default = "default_message_window")]
    pub message_window: usize,
}

fn default_max_steps() -> u32 {
    50
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_message_window() -> usize {
    40
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            message_window: default_message_window(),
        }
    }
}

/// Model parameters. All optional; None defers to the model client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Completion token cap per model call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Run log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Markdown run log path. None writes to a timestamped temp file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Log level label recorded in the run log.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_file: None,
            log_level: default_log_level(),
        }
    }
}

/// Root settings document.
///
/// Every section and field carries a serde default, so an absent file, an
/// empty file, and a partial file all produce usable settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Agent identity.
    pub agent: AgentSettings,
    /// Execution budgets.
    pub execution: ExecutionSettings,
    /// Model parameters.
    pub model: ModelSettings,
    /// Run log settings.
    pub logging: LoggingSettings,
    /// Run-state and conversation storage.
    #[cfg(feature = "store")]
    pub state: StateConfig,
    /// Long-lived agent memory storage.
    #[cfg(feature = "store")]
    pub memory: StateConfig,
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the settings file. If None, uses `config/agent.toml`.
    ///
    /// A missing file yields defaults; an unreadable or malformed file is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or(Path::new("config/agent.toml"));
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML settings: {}", path.display()))
    }

    /// Fold environment overrides into the settings.
    pub fn apply_environment(&mut self, env: &super::EnvironmentLoader) {
        if let Some(model) = env.model() {
            self.model.name = Some(model);
        }
        #[cfg(feature = "store")]
        {
            if let Some(url) = env.state_url() {
                self.state.url = Some(url);
            }
            if let Some(token) = env.state_token() {
                self.state.token = Some(token);
            }
        }
    }

    /// The engine configuration these settings describe.
    #[cfg(feature = "engine")]
    pub fn engine_config(&self) -> crate::engine::EngineConfig {
        crate::engine::EngineConfig {
            agent_id: self.agent.id.clone(),
            system_prompt: self.agent.system_prompt.clone(),
            model_name: self.model.name.clone(),
            temperature: self.model.temperature,
            max_tokens: self.model.max_tokens,
            max_steps: self.execution.max_steps,
            timeout: std::time::Duration::from_secs(self.execution.timeout_seconds),
            max_retries: self.execution.max_retries,
            message_window: self.execution.message_window,
            working_dir: self.agent.working_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.agent.id, "agent");
        assert_eq!(settings.agent.system_prompt, "You are a helpful agent.");
        assert_eq!(settings.execution.max_steps, 50);
        assert_eq!(settings.execution.timeout_seconds, 300);
        assert_eq!(settings.execution.max_retries, 3);
        assert_eq!(settings.execution.message_window, 40);
        assert!(settings.model.name.is_none());
        assert_eq!(settings.logging.log_level, "INFO");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let settings = Settings::load(Some(Path::new("/nonexistent/agent.toml"))).unwrap();
        assert_eq!(settings.execution.max_steps, 50);
    }

    #[test]
    fn test_settings_from_toml() {
        use tempfile::NamedTempFile;

        let toml_content = r#"
[agent]
id = "support-agent"
system_prompt = "You answer support tickets."

[execution]
max_steps = 12
timeout_seconds = 60

[model]
name = "gpt-4o"
temperature = 0.2

[logging]
log_level = "DEBUG"
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).unwrap();

        let settings = Settings::load(Some(temp_file.path())).unwrap();
        assert_eq!(settings.agent.id, "support-agent");
        assert_eq!(settings.execution.max_steps, 12);
        assert_eq!(settings.execution.timeout_seconds, 60);
        // Omitted fields fall back to defaults.
        assert_eq!(settings.execution.max_retries, 3);
        assert_eq!(settings.execution.message_window, 40);
        assert_eq!(settings.model.name.as_deref(), Some("gpt-4o"));
        assert_eq!(settings.model.temperature, Some(0.2));
        assert_eq!(settings.logging.log_level, "DEBUG");
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        use tempfile::NamedTempFile;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[agent\nid = broken").unwrap();

        let result = Settings::load(Some(temp_file.path()));
        assert!(result.is_err());
    }

    #[cfg(feature = "store")]
    #[test]
    fn test_state_blocks_from_toml() {
        use crate::store::StoreProvider;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[state]
provider = "mongodb"
url = "mongodb://localhost:27017"
table = "ace"
ttl = 3600

[memory]
provider = "file"
path = "./memory"
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).unwrap();

        let settings = Settings::load(Some(temp_file.path())).unwrap();
        assert_eq!(settings.state.provider, StoreProvider::Mongodb);
        assert_eq!(
            settings.state.url.as_deref(),
            Some("mongodb://localhost:27017")
        );
        assert_eq!(settings.state.ttl, Some(3600));
        assert_eq!(settings.memory.provider, StoreProvider::File);
        assert_eq!(settings.memory.file_path(), PathBuf::from("./memory"));
    }

    #[cfg(feature = "engine")]
    #[test]
    fn test_engine_config_mapping() {
        let mut settings = Settings::default();
        settings.agent.id = "ops".to_string();
        settings.execution.timeout_seconds = 45;
        settings.model.name = Some("claude-sonnet".to_string());

        let config = settings.engine_config();
        assert_eq!(config.agent_id, "ops");
        assert_eq!(config.timeout, std::time::Duration::from_secs(45));
        assert_eq!(config.model_name.as_deref(), Some("claude-sonnet"));
        assert_eq!(config.max_steps, 50);
    }
}
