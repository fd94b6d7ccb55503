//! Markdown run logging.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Markdown-formatted log of agent runs.
///
/// One file accumulates run headers, per-event entries, and model exchanges
/// in the order they happened, for offline inspection. Structured
/// diagnostics go through `tracing`; this log is the human-readable
/// counterpart.
#[derive(Debug)]
pub struct RunLogger {
    log_file: PathBuf,
    log_level: String,
}

impl RunLogger {
    /// Initialize the run logger.
    ///
    /// # Arguments
    /// * `log_file` - Path to log file. If None, creates a timestamped file in temp directory.
    /// * `log_level` - Logging level label (defaults to "INFO").
    pub fn new(log_file: Option<&Path>, log_level: Option<&str>) -> Result<Self> {
        let log_file = match log_file {
            Some(p) => p.to_path_buf(),
            None => {
                let mut dir = std::env::temp_dir();
                dir.push("ace-logs");
                std::fs::create_dir_all(&dir).with_context(|| {
                    format!("Failed to create log directory: {}", dir.display())
                })?;
                let filename = format!(
                    "run_{}_{}.md",
                    Utc::now().timestamp_millis(),
                    std::process::id()
                );
                dir.join(filename)
            }
        };

        let log_level = log_level.unwrap_or("INFO").to_string();

        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }

        let logger = Self {
            log_file,
            log_level,
        };

        if !logger.log_file.exists() {
            logger.initialize_log_file()?;
        }

        Ok(logger)
    }

    /// Initialize the log file with header.
    fn initialize_log_file(&self) -> Result<()> {
        let mut file = File::create(&self.log_file)
            .with_context(|| format!("Failed to create log file: {}", self.log_file.display()))?;

        let now: DateTime<Utc> = Utc::now();

        writeln!(file, "# Agent Run Log\n")?;
        writeln!(file, "Log started: {}\n", now.to_rfc3339())?;
        writeln!(file, "---\n")?;

        Ok(())
    }

    /// Append content to log file.
    fn append_to_log(&self, content: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .with_context(|| format!("Failed to open log file: {}", self.log_file.display()))?;

        write!(file, "{}", content).with_context(|| "Failed to write to log file")?;

        Ok(())
    }

    /// Log the start of a run.
    ///
    /// # Arguments
    /// * `run_id` - Id of the run.
    /// * `agent_id` - Identity the run executes under.
    /// * `task` - The task text the run was started with.
    pub fn log_run_start(&self, run_id: &str, agent_id: &str, task: &str) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "## Run Started - {}\n\n**Run:** {}\n**Agent:** {}\n**Task:** {}\n\n",
            now.to_rfc3339(),
            run_id,
            agent_id,
            task
        );

        self.append_to_log(&content)
    }

    /// Log one run event.
    ///
    /// # Arguments
    /// * `kind` - The event's wire tag (e.g. `step:started`).
    /// * `detail` - The event payload.
    pub fn log_event(&self, kind: &str, detail: &serde_json::Value) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### {} - {}\n\n```json\n{}\n```\n\n",
            kind,
            now.to_rfc3339(),
            serde_json::to_string_pretty(detail).unwrap_or_default()
        );

        self.append_to_log(&content)
    }

    /// Log a model exchange.
    ///
    /// Skips the entry when the response is empty or whitespace.
    ///
    /// # Arguments
    /// * `model` - Model name used.
    /// * `response` - Model response text.
    /// * `input_tokens` - Prompt tokens consumed.
    /// * `output_tokens` - Completion tokens consumed.
    pub fn log_model_exchange(
        &self,
        model: &str,
        response: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<()> {
        if response.trim().is_empty() {
            return Ok(());
        }

        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### Model Exchange - {}\n\n**Model:** {}\n**Tokens:** {} in / {} out\n\n**Response:**\n```\n{}\n```\n\n",
            now.to_rfc3339(),
            model,
            input_tokens,
            output_tokens,
            response
        );

        self.append_to_log(&content)
    }

    /// Log the end of a run.
    ///
    /// # Arguments
    /// * `run_id` - Id of the run.
    /// * `status` - Terminal status label (completed, error, cancelled).
    /// * `steps` - Steps the run consumed.
    pub fn log_run_end(&self, run_id: &str, status: &str, steps: u32) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "## Run Finished - {}\n\n**Run:** {}\n**Status:** {}\n**Steps:** {}\n\n---\n\n",
            now.to_rfc3339(),
            run_id,
            status,
            steps
        );

        self.append_to_log(&content)
    }

    /// Get the log file path.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Get the log level.
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

#[cfg(test)]
mod tests;
