//! Error types for z-ledger storage.

use rocksdb::ErrorKind;
use z_ledger_core::LedgerError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A row lock could not be acquired (timeout or deadlock).
    ///
    /// Retried by `run_in_transaction`; surfaces only once retries are exhausted.
    #[error("lock contention: {0}")]
    Contention(String),

    /// A ledger rule rejected the operation. Nothing was written.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl StoreError {
    /// Domain error carried by this store error, if any.
    #[must_use]
    pub const fn as_ledger(&self) -> Option<&LedgerError> {
        match self {
            Self::Ledger(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        match e.kind() {
            ErrorKind::TimedOut | ErrorKind::Busy | ErrorKind::TryAgain => {
                Self::Contention(e.to_string())
            }
            _ => Self::Database(e.to_string()),
        }
    }
}
