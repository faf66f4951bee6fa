//! Configuration for sessions and stores.

use crate::error::{ClaimError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// When a validator may claim another batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimGate {
    /// Any time rows are available.
    #[default]
    Always,
    /// Only once every claimed row is done.
    WhenNoPending,
    /// Only while the validator owns no rows at all.
    WhenNoneAssigned,
}

/// Assignment configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    /// Smallest batch a validator may claim.
    pub min_batch: usize,

    /// Largest batch a validator may claim.
    pub max_batch: usize,

    /// Batch size offered by default.
    pub default_batch: usize,

    /// Read/mutate/commit cycles tried before a conflict is reported.
    pub max_commit_attempts: u32,

    /// When a validator may claim another batch.
    pub claim_gate: ClaimGate,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            min_batch: 5,
            max_batch: 50,
            default_batch: 10,
            max_commit_attempts: 3,
            claim_gate: ClaimGate::Always,
        }
    }
}

impl AssignmentConfig {
    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        let config: Self =
            serde_json::from_slice(&data).map_err(|e| ClaimError::Deserialization(e.to_string()))?;
        Ok(config)
    }

    /// Reject batch sizes outside `min_batch..=max_batch`.
    pub fn check_batch_size(&self, requested: usize) -> Result<usize> {
        if requested < self.min_batch || requested > self.max_batch {
            return Err(ClaimError::InvalidBatchSize {
                requested,
                min: self.min_batch,
                max: self.max_batch,
            });
        }
        Ok(requested)
    }
}

/// File store configuration.
#[derive(Clone, Debug)]
pub struct FileStoreConfig {
    /// Directory holding the table file and its lock.
    pub path: PathBuf,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./claimboard"),
            create_if_missing: true,
        }
    }
}
