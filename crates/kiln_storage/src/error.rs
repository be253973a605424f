//! Error types for storage engine operations.

use std::io;
use thiserror::Error;

/// Result type for storage engine operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Conditions reported by a storage engine.
///
/// Every variant has a stable numeric [`code`](StorageError::code) so that
/// callers on the far side of the C boundary can identify it without
/// parsing messages.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The database file does not exist and creation was not requested.
    #[error("database not found: {path}")]
    DatabaseNotFound {
        /// The path that was opened.
        path: String,
    },

    /// The database was opened read-only.
    #[error("database is read-only")]
    ReadOnly,

    /// The supplied encryption key does not match the stored one.
    #[error("encryption key mismatch or missing")]
    WrongKey,

    /// The referenced transaction is not the engine's open transaction.
    #[error("unknown transaction {0}")]
    UnknownTransaction(u64),

    /// The engine already has an open transaction.
    #[error("a transaction is already open")]
    TransactionOpen,

    /// The storage is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The engine has been closed.
    #[error("storage is closed")]
    Closed,

    /// A remote replica answered with an HTTP-style status.
    #[error("remote storage returned status {status}")]
    Remote {
        /// The status code.
        status: u16,
    },
}

impl StorageError {
    /// Returns the stable engine-domain code for this error.
    ///
    /// I/O errors have no engine code of their own; they are identified by
    /// their OS error number instead (see [`StorageError::os_error`]).
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Io(_) => 1,
            Self::DatabaseNotFound { .. } => 2,
            Self::ReadOnly => 3,
            Self::WrongKey => 4,
            Self::UnknownTransaction(_) => 5,
            Self::TransactionOpen => 6,
            Self::Corrupted(_) => 7,
            Self::Closed => 8,
            Self::Remote { .. } => 9,
        }
    }

    /// Returns the OS error number if this wraps an OS-level I/O failure.
    #[must_use]
    pub fn os_error(&self) -> Option<i32> {
        match self {
            Self::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }

    /// Returns the HTTP-style status if a remote replica reported one.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Remote { status } => Some(*status),
            _ => None,
        }
    }
}
