//! Error types for Kiln core operations.

use crate::recorder::http_status_to_error;
use kiln_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type KilnResult<T> = Result<T, KilnError>;

/// Error domains: the first half of an error's two-part identifier.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorDomain {
    /// No error.
    #[default]
    None = 0,
    /// Kiln's own codes, see [`KilnErrorCode`].
    Kiln = 1,
    /// Codes reported by the storage engine.
    Engine = 2,
    /// OS error numbers.
    Posix = 3,
    /// HTTP statuses with no Kiln equivalent.
    Http = 4,
}

impl ErrorDomain {
    /// Converts a raw domain value, returning `None` for unknown values.
    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Kiln),
            2 => Some(Self::Engine),
            3 => Some(Self::Posix),
            4 => Some(Self::Http),
            _ => None,
        }
    }
}

/// Codes in the [`ErrorDomain::Kiln`] domain.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KilnErrorCode {
    /// An internal error without a code of its own.
    InternalException = 1,
    /// An assertion failed (a panic with a message).
    AssertionFailed = 2,
    /// Allocation failed.
    MemoryError = 3,
    /// The operation requires an open transaction.
    NotInTransaction = 4,
    /// The operation requires that no transaction be open.
    TransactionNotClosed = 5,
    /// An argument was invalid.
    InvalidParameter = 6,
    /// The requested item does not exist.
    NotFound = 7,
    /// A conflicting change was made.
    Conflict = 8,
    /// The caller is not allowed to do this.
    NotAllowed = 9,
    /// The database is closed.
    NotOpen = 10,
    /// Encryption key missing or wrong.
    Crypto = 11,
    /// A remote peer reported a server error.
    RemoteError = 12,
    /// The item existed but is gone.
    Gone = 13,
    /// A fault of unrecognized type.
    UnexpectedError = 14,
}

impl KilnErrorCode {
    /// Converts a raw code, returning `None` for unknown values.
    #[must_use]
    pub fn from_raw(raw: i32) -> Option<Self> {
        let code = match raw {
            1 => Self::InternalException,
            2 => Self::AssertionFailed,
            3 => Self::MemoryError,
            4 => Self::NotInTransaction,
            5 => Self::TransactionNotClosed,
            6 => Self::InvalidParameter,
            7 => Self::NotFound,
            8 => Self::Conflict,
            9 => Self::NotAllowed,
            10 => Self::NotOpen,
            11 => Self::Crypto,
            12 => Self::RemoteError,
            13 => Self::Gone,
            14 => Self::UnexpectedError,
            _ => return None,
        };
        Some(code)
    }

    /// Returns a short human-readable description.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::InternalException => "internal exception",
            Self::AssertionFailed => "assertion failed",
            Self::MemoryError => "out of memory",
            Self::NotInTransaction => "not in a transaction",
            Self::TransactionNotClosed => "transaction not closed",
            Self::InvalidParameter => "invalid parameter",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::NotAllowed => "not allowed",
            Self::NotOpen => "database not open",
            Self::Crypto => "encryption key missing or incorrect",
            Self::RemoteError => "remote server error",
            Self::Gone => "gone",
            Self::UnexpectedError => "unexpected error",
        }
    }
}

/// A caller-visible error: `{domain, code}`.
///
/// `code == 0` means success. The record is caller-owned; Kiln writes it at
/// most once per boundary call and never reads it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorRecord {
    /// The error domain.
    pub domain: ErrorDomain,
    /// The code within the domain; 0 for no error.
    pub code: i32,
}

impl ErrorRecord {
    /// The "no error" sentinel.
    pub const NONE: Self = Self {
        domain: ErrorDomain::None,
        code: 0,
    };

    /// Creates a record.
    #[must_use]
    pub const fn new(domain: ErrorDomain, code: i32) -> Self {
        Self { domain, code }
    }

    /// Creates a record in the Kiln domain.
    #[must_use]
    pub const fn kiln(code: KilnErrorCode) -> Self {
        Self::new(ErrorDomain::Kiln, code as i32)
    }

    /// Returns true if this record describes an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.code != 0
    }
}

/// Errors raised by Kiln core operations.
///
/// Every variant maps to a `{domain, code}` pair through
/// [`domain`](KilnError::domain) and [`code`](KilnError::code).
#[derive(Debug, Error)]
pub enum KilnError {
    /// The operation requires an open transaction.
    #[error("not in a transaction")]
    NotInTransaction,

    /// The operation requires that no transaction be open.
    #[error("a transaction is still open")]
    TransactionNotClosed,

    /// An argument was invalid.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The storage engine reported an error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// An error identified only by its domain and code.
    #[error("{domain:?} error {code}")]
    Coded {
        /// The error domain.
        domain: ErrorDomain,
        /// The code within the domain.
        code: i32,
    },
}

impl KilnError {
    /// Creates an invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Creates an error in the Kiln domain.
    pub fn kiln(code: KilnErrorCode) -> Self {
        Self::Coded {
            domain: ErrorDomain::Kiln,
            code: code as i32,
        }
    }

    /// Creates an error from an HTTP-style status.
    pub fn from_http_status(status: i32) -> Self {
        let (domain, code) = http_status_to_error(status);
        Self::Coded { domain, code }
    }

    /// Returns the error domain.
    #[must_use]
    pub fn domain(&self) -> ErrorDomain {
        self.record().domain
    }

    /// Returns the code within the domain.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.record().code
    }

    /// Returns the `{domain, code}` pair for this error.
    #[must_use]
    pub fn record(&self) -> ErrorRecord {
        match self {
            Self::NotInTransaction => ErrorRecord::kiln(KilnErrorCode::NotInTransaction),
            Self::TransactionNotClosed => ErrorRecord::kiln(KilnErrorCode::TransactionNotClosed),
            Self::InvalidParameter(_) => ErrorRecord::kiln(KilnErrorCode::InvalidParameter),
            Self::NotFound(_) => ErrorRecord::kiln(KilnErrorCode::NotFound),
            Self::Storage(e) => storage_error_record(e),
            Self::Coded { domain, code } => ErrorRecord::new(*domain, *code),
        }
    }
}

/// Maps an engine-reported error onto `{domain, code}`.
///
/// OS failures keep their errno, remote statuses go through the HTTP
/// table, and a few engine conditions have direct Kiln equivalents.
pub(crate) fn storage_error_record(err: &StorageError) -> ErrorRecord {
    if let Some(errno) = err.os_error() {
        return ErrorRecord::new(ErrorDomain::Posix, errno);
    }
    if let Some(status) = err.http_status() {
        let (domain, code) = http_status_to_error(i32::from(status));
        return ErrorRecord::new(domain, code);
    }
    match err {
        StorageError::Closed => ErrorRecord::kiln(KilnErrorCode::NotOpen),
        StorageError::WrongKey => ErrorRecord::kiln(KilnErrorCode::Crypto),
        other => ErrorRecord::new(ErrorDomain::Engine, other.code()),
    }
}
