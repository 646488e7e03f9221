//! Intermediate chunk-result storage.
//!
//! Each distributed chunk writes its result to a uniquely-keyed location
//! (`<root>/run-<run_id>/chunk-<index>.json`); the aggregator reads and
//! then deletes the whole run directory. Run IDs are UUIDs, so concurrent
//! runs never collide. Cleanup is unconditional on every exit path.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use super::chunk::ChunkResult;

/// Filesystem-backed intermediate storage for chunk results.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding one run's artifacts.
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(format!("run-{}", run_id))
    }

    fn chunk_path(&self, run_id: &str, chunk_index: usize) -> PathBuf {
        self.run_dir(run_id).join(format!("chunk-{}.json", chunk_index))
    }

    /// Persist one chunk result. Write-once per chunk: each key is owned by
    /// exactly one processor task.
    pub async fn write(&self, run_id: &str, result: &ChunkResult) -> Result<PathBuf> {
        let dir = self.run_dir(run_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create run dir {}", dir.display()))?;

        let path = self.chunk_path(run_id, result.chunk_index);
        let body = serde_json::to_vec(result).context("Failed to encode chunk result")?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write chunk result to {}", path.display()))?;

        debug!(run_id, chunk = result.chunk_index, path = %path.display(), "Stored chunk result");
        Ok(path)
    }

    /// Read one chunk result back.
    pub async fn read(&self, run_id: &str, chunk_index: usize) -> Result<ChunkResult> {
        let path = self.chunk_path(run_id, chunk_index);
        let body = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read chunk result from {}", path.display()))?;

        serde_json::from_slice(&body)
            .with_context(|| format!("Failed to decode chunk result from {}", path.display()))
    }

    /// Whether a chunk's artifact exists.
    pub async fn exists(&self, run_id: &str, chunk_index: usize) -> bool {
        tokio::fs::try_exists(self.chunk_path(run_id, chunk_index))
            .await
            .unwrap_or(false)
    }

    /// Delete every artifact of a run. A run that never wrote anything is
    /// not an error.
    pub async fn remove_run(&self, run_id: &str) -> Result<()> {
        let dir = self.run_dir(run_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(run_id, "Removed run artifacts");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove run dir {}", dir.display()))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
