//! Checkpoint persistence
//!
//! The checkpoint is the only durable contract of a run: everything needed
//! to resume without re-spending quota. Saves are atomic (write to a
//! temporary file, then rename over the previous one) so a crash mid-write
//! can never corrupt the last valid checkpoint. A checkpoint that exists
//! but cannot be read is a hard error: proceeding would silently lose
//! resumability and re-bill quota already spent.

use crate::records::ChannelRecord;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by checkpoint persistence
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint file {path} is corrupt: {source}. Refusing to continue; move the file aside to start fresh")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Refusing to write checkpoint with fewer completed tasks ({new}) than already on disk ({old})")]
    Regression { old: usize, new: usize },

    #[error("Failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable snapshot of run progress
///
/// Forward-compatible: unknown fields are ignored on load and fields added
/// later default when absent, so checkpoints survive schema evolution
/// across runs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunCheckpoint {
    /// Monotonically increasing save counter within a run
    #[serde(default)]
    pub sequence: u64,

    /// Number of accepted records at save time
    #[serde(default)]
    pub accepted_count: usize,

    /// Ids of tasks completed so far
    #[serde(default)]
    pub completed_tasks: Vec<String>,

    /// Ids of tasks that exhausted their retry budget
    #[serde(default)]
    pub failed_tasks: Vec<String>,

    /// Every channel id encountered, accepted or not
    #[serde(default)]
    pub seen_ids: Vec<String>,

    /// The accepted records themselves
    #[serde(default)]
    pub records: Vec<ChannelRecord>,

    /// Hash of the config the run was started with
    #[serde(default)]
    pub config_hash: String,

    /// When this checkpoint was written, RFC 3339
    #[serde(default)]
    pub saved_at: String,
}

/// Writes and reads checkpoints at a fixed path
pub struct CheckpointStore {
    path: PathBuf,
    last_sequence: u64,
    last_completed: usize,
}

impl CheckpointStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            last_sequence: 0,
            last_completed: 0,
        }
    }

    /// Loads the checkpoint if one exists
    ///
    /// # Returns
    ///
    /// * `Ok(Some(checkpoint))` - A valid checkpoint was found
    /// * `Ok(None)` - No checkpoint exists; this is a fresh run
    /// * `Err(CheckpointError::Corrupt)` - A file exists but cannot be parsed
    pub fn load(&mut self) -> Result<Option<RunCheckpoint>, CheckpointError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| CheckpointError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;

        let checkpoint: RunCheckpoint =
            serde_json::from_str(&content).map_err(|e| CheckpointError::Corrupt {
                path: self.path.display().to_string(),
                source: e,
            })?;

        self.last_sequence = checkpoint.sequence;
        self.last_completed = checkpoint.completed_tasks.len();

        tracing::info!(
            "Loaded checkpoint #{}: {} records, {} tasks completed",
            checkpoint.sequence,
            checkpoint.accepted_count,
            checkpoint.completed_tasks.len()
        );

        Ok(Some(checkpoint))
    }

    /// Atomically writes a checkpoint, assigning its sequence number
    ///
    /// Never allows the on-disk checkpoint to represent fewer completed
    /// tasks than an earlier successful save.
    pub fn save(&mut self, checkpoint: &mut RunCheckpoint) -> Result<(), CheckpointError> {
        if checkpoint.completed_tasks.len() < self.last_completed {
            return Err(CheckpointError::Regression {
                old: self.last_completed,
                new: checkpoint.completed_tasks.len(),
            });
        }

        checkpoint.sequence = self.last_sequence + 1;
        checkpoint.saved_at = chrono::Utc::now().to_rfc3339();

        let json = serde_json::to_string_pretty(checkpoint)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Io {
                    path: parent.display().to_string(),
                    source: e,
                })?;
            }
        }

        // Temp file in the same directory so the rename stays on one filesystem
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|e| CheckpointError::Io {
            path: tmp_path.display().to_string(),
            source: e,
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| CheckpointError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;

        self.last_sequence = checkpoint.sequence;
        self.last_completed = checkpoint.completed_tasks.len();

        tracing::info!(
            "Checkpoint #{} saved: {} records, {} tasks completed",
            checkpoint.sequence,
            checkpoint.accepted_count,
            checkpoint.completed_tasks.len()
        );

        Ok(())
    }

    /// The path this store writes to
    pub fn path(&self) -> &Path {
        &self.path
    }
}
