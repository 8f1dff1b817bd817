//! Ledger error types

use thiserror::Error;

use super::types::PartitionKind;

/// Errors for ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Backend is not reachable; callers degrade instead of failing
    #[error("Ledger unavailable")]
    Unavailable,

    /// Conditional insert hit an existing transaction hash
    #[error("Duplicate transaction hash: {0}")]
    Duplicate(String),

    /// Operation addressed the wrong collection
    #[error("Wrong partition kind: expected {expected:?}, got {actual:?}")]
    WrongPartition {
        expected: PartitionKind,
        actual: PartitionKind,
    },

    /// Database rejected the operation
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Network error during API call
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Response could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Reject calls made against the wrong collection
pub(crate) fn expect_kind(actual: PartitionKind, expected: PartitionKind) -> LedgerResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(LedgerError::WrongPartition { expected, actual })
    }
}
