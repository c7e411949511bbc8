//! Transaction error types.

use thiserror::Error;

use crate::data::DataPath;
use crate::storage::StorageError;
use crate::transaction::read_only::LogicalDatastoreType;
use crate::translate::{AppliedChange, DispatchError, ReadFailed, WriteFailed, WritePhase};

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Errors that can occur during transaction operations.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// Another transaction committed since this one started.
    #[error("transaction conflict: configuration moved from {expected} to {actual}")]
    Conflict { expected: String, actual: String },

    /// The device rejected a change. Changes listed in `applied` were
    /// accepted by the device before the failure and are not undone.
    #[error("{source}")]
    Write {
        source: WriteFailed,
        applied: Vec<AppliedChange>,
    },

    /// An operational read failed.
    #[error(transparent)]
    Read(#[from] ReadFailed),

    #[error("{0} is not supported")]
    Unsupported(&'static str),

    /// The operational store is read-only.
    #[error("cannot {operation} in the {store} store")]
    InvalidStore {
        operation: &'static str,
        store: LogicalDatastoreType,
    },

    /// The path belongs to the name mappings, which only writer
    /// customizers maintain.
    #[error("cannot {operation} {path}: reserved for name mappings")]
    ReservedRegion {
        operation: &'static str,
        path: DataPath,
    },
}

impl From<StorageError> for TransactionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConcurrentModification {
                expected, actual, ..
            } => TransactionError::Conflict { expected, actual },
            other => TransactionError::Storage(other),
        }
    }
}

impl From<DispatchError> for TransactionError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Storage(e) => e.into(),
            DispatchError::Write { source, applied } => TransactionError::Write { source, applied },
        }
    }
}

impl TransactionError {
    /// Check if this error is an optimistic commit conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, TransactionError::Conflict { .. })
    }

    /// Check if this error is retryable.
    ///
    /// Only conflicts are: nothing reached the device, so the caller can
    /// redo the transaction on top of the new configuration.
    pub fn is_retryable(&self) -> bool {
        self.is_conflict()
    }

    /// The write phase a device failure happened in.
    pub fn phase(&self) -> Option<WritePhase> {
        match self {
            TransactionError::Write { source, .. } => Some(source.phase()),
            _ => None,
        }
    }
}
