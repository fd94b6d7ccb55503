//! Atomic file operations for safe store writes.

use crate::store::traits::{StoreError, StoreResult};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Atomic file writer using the write-temp-rename pattern.
///
/// A reader never observes a half-written file: content lands in a uniquely
/// named temp file first and only an atomic rename publishes it. If the
/// writer is dropped without committing, the temp file is removed.
pub struct AtomicFileWriter {
    target_path: PathBuf,
    temp_path: PathBuf,
}

impl AtomicFileWriter {
    /// Create a new atomic writer for the target path.
    pub fn new(target_path: &Path) -> StoreResult<Self> {
        let temp_path = Self::generate_temp_path(target_path)?;

        Ok(AtomicFileWriter {
            target_path: target_path.to_path_buf(),
            temp_path,
        })
    }

    /// Write content to the file atomically.
    pub async fn write_content(&self, content: &str) -> StoreResult<()> {
        if let Some(parent) = self.target_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.temp_path, content).await?;

        self.commit().await
    }

    /// Write JSON data to the file atomically.
    pub async fn write_json<T: serde::Serialize>(&self, data: &T) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(data)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.write_content(&content).await
    }

    /// Commit the write by renaming the temp file onto the target.
    pub async fn commit(&self) -> StoreResult<()> {
        tokio::fs::rename(&self.temp_path, &self.target_path)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to commit atomic write: {}", e)))
    }

    /// Abort the write by deleting the temp file.
    pub fn abort(&self) {
        if self.temp_path.exists() {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }

    /// Generate a unique temporary file path next to the target.
    fn generate_temp_path(target: &Path) -> StoreResult<PathBuf> {
        let parent = target.parent().ok_or_else(|| {
            StoreError::Configuration("Target path has no parent directory".to_string())
        })?;

        let filename = target
            .file_name()
            .ok_or_else(|| StoreError::Configuration("Target path has no filename".to_string()))?;

        let temp_name = format!("{}.tmp.{}", filename.to_string_lossy(), Uuid::new_v4());

        Ok(parent.join(temp_name))
    }
}

impl Drop for AtomicFileWriter {
    fn drop(&mut self) {
        // Clean up temp file if the write never committed
        self.abort();
    }
}
