//! Error types for the claim board.

use crate::types::Revision;
use thiserror::Error;

/// Main error type for claim board operations.
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to load table: {0}")]
    Fetch(String),

    #[error("Failed to persist table: {0}")]
    Persist(String),

    #[error("Revision conflict: expected {expected}, store is at {found}")]
    Conflict { expected: Revision, found: Revision },

    #[error("Row {row} is owned by {owner:?}, not {user:?}")]
    OwnershipMismatch {
        row: usize,
        owner: String,
        user: String,
    },

    #[error("Row not found: {row} (table has {len} rows)")]
    RowNotFound { row: usize, len: usize },

    #[error("Batch size {requested} outside allowed range {min}..={max}")]
    InvalidBatchSize {
        requested: usize,
        min: usize,
        max: usize,
    },

    #[error("Validator still holds {assigned} rows ({pending} pending)")]
    OutstandingWork { assigned: usize, pending: usize },

    #[error("Validator name must not be empty")]
    EmptyIdentity,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid table file: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Table file is locked by another process")]
    Locked,
}

impl ClaimError {
    /// Message fit for showing to the validator.
    pub fn user_message(&self) -> String {
        match self {
            ClaimError::Fetch(detail) => format!("Could not load the data: {}", detail),
            ClaimError::Persist(detail) => {
                format!("Your change was not saved, please try again: {}", detail)
            }
            ClaimError::Conflict { .. } | ClaimError::Locked => {
                "Someone else changed the data at the same time, please try again.".to_string()
            }
            ClaimError::OwnershipMismatch { row, .. } => {
                format!("Row {} is not assigned to you.", row + 1)
            }
            ClaimError::RowNotFound { row, .. } => format!("Row {} does not exist.", row + 1),
            ClaimError::InvalidBatchSize { min, max, .. } => {
                format!("Choose between {} and {} rows.", min, max)
            }
            ClaimError::OutstandingWork { pending, .. } if *pending > 0 => {
                format!("Finish your {} pending rows before taking more.", pending)
            }
            ClaimError::OutstandingWork { .. } => {
                "You already have a batch assigned.".to_string()
            }
            ClaimError::EmptyIdentity => "Please enter your name.".to_string(),
            other => format!("Unexpected error: {}", other),
        }
    }

    /// Whether repeating the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClaimError::Io(_)
                | ClaimError::Fetch(_)
                | ClaimError::Persist(_)
                | ClaimError::Conflict { .. }
                | ClaimError::Locked
        )
    }
}

impl From<serde_json::Error> for ClaimError {
    fn from(e: serde_json::Error) -> Self {
        ClaimError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for ClaimError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        ClaimError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for ClaimError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        ClaimError::Deserialization(e.to_string())
    }
}

/// Result type for claim board operations.
pub type Result<T> = std::result::Result<T, ClaimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_uses_display_numbers() {
        let err = ClaimError::OwnershipMismatch {
            row: 0,
            owner: "alice".into(),
            user: "bob".into(),
        };
        assert_eq!(err.user_message(), "Row 1 is not assigned to you.");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ClaimError::Persist("quota".into()).is_retryable());
        assert!(ClaimError::Conflict {
            expected: Revision(1),
            found: Revision(2)
        }
        .is_retryable());
        assert!(!ClaimError::EmptyIdentity.is_retryable());
        assert!(!ClaimError::RowNotFound { row: 3, len: 2 }.is_retryable());
    }
}
