//! Translation of internal faults into caller-visible error records.
//!
//! Every boundary-facing operation runs its body through [`catch_error`],
//! which classifies whatever went wrong from most to least specific:
//!
//! 1. a [`KilnError`], returned or raised with `panic_any`, keeps its own
//!    domain and code ([`record_kiln_error`])
//! 2. any other error value, or a panic carrying a message, is recorded
//!    on a best-effort basis ([`record_exception`])
//! 3. anything else gets the fixed "unexpected error" sentinel
//!    ([`record_unknown_exception`])
//!
//! A `None` output slot means the caller does not want the error; every
//! entry accepts it and does nothing.

use crate::error::{storage_error_record, ErrorDomain, ErrorRecord, KilnError, KilnErrorCode};
use kiln_storage::StorageError;
use std::any::Any;
use std::error::Error;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// A boxed error value returned from a boundary body.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Writes `{domain, code}` into the output slot.
pub fn record_error(domain: ErrorDomain, code: i32, out: Option<&mut ErrorRecord>) {
    if let Some(out) = out {
        *out = ErrorRecord::new(domain, code);
    }
}

/// Maps an HTTP-style status onto `{domain, code}`.
///
/// Statuses with a Kiln equivalent are translated; other 4xx and higher
/// statuses are kept verbatim in the [`ErrorDomain::Http`] domain.
/// Anything below 400 (0 included) is not an error status and is reported
/// as [`KilnErrorCode::RemoteError`], so the code is never the "no error"
/// value.
#[must_use]
pub fn http_status_to_error(status: i32) -> (ErrorDomain, i32) {
    let code = match status {
        ..=399 => KilnErrorCode::RemoteError,
        400 => KilnErrorCode::InvalidParameter,
        401 | 403 => KilnErrorCode::NotAllowed,
        404 => KilnErrorCode::NotFound,
        409 => KilnErrorCode::Conflict,
        410 => KilnErrorCode::Gone,
        500..=599 => KilnErrorCode::RemoteError,
        _ => return (ErrorDomain::Http, status),
    };
    (ErrorDomain::Kiln, code as i32)
}

/// Records an HTTP-style status.
pub fn record_http_error(status: i32, out: Option<&mut ErrorRecord>) {
    let (domain, code) = http_status_to_error(status);
    record_error(domain, code, out);
}

/// Records a typed Kiln error using its own domain and code.
pub fn record_kiln_error(err: &KilnError, out: Option<&mut ErrorRecord>) {
    let record = err.record();
    debug!(domain = ?record.domain, code = record.code, "recording error: {err}");
    record_error(record.domain, record.code, out);
}

/// Records a generic error value.
///
/// Walks the source chain looking for something that carries its own
/// domain and code; falls back to [`KilnErrorCode::InternalException`].
pub fn record_exception(err: &(dyn Error + 'static), out: Option<&mut ErrorRecord>) {
    let record = exception_record(err);
    debug!(domain = ?record.domain, code = record.code, "recording exception: {err}");
    record_error(record.domain, record.code, out);
}

/// Records a fault of unrecognized type.
pub fn record_unknown_exception(out: Option<&mut ErrorRecord>) {
    warn!("recording unknown exception");
    record_error(
        ErrorDomain::Kiln,
        KilnErrorCode::UnexpectedError as i32,
        out,
    );
}

/// Writes the "no error" sentinel into the output slot.
pub fn clear_error(out: Option<&mut ErrorRecord>) {
    if let Some(out) = out {
        *out = ErrorRecord::NONE;
    }
}

/// Runs a boundary body, translating any fault into the output slot.
///
/// Returns `Some` with the body's value on success, leaving the slot
/// untouched. Returns `None` if the body returned an error or panicked; the
/// fault never propagates past this call.
pub fn catch_error<T>(
    out: Option<&mut ErrorRecord>,
    body: impl FnOnce() -> Result<T, BoxError>,
) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            match err.downcast::<KilnError>() {
                Ok(kiln) => record_kiln_error(&kiln, out),
                Err(other) => record_exception(other.as_ref(), out),
            }
            None
        }
        Err(payload) => {
            record_panic(payload, out);
            None
        }
    }
}

fn record_panic(payload: Box<dyn Any + Send>, out: Option<&mut ErrorRecord>) {
    let payload = match payload.downcast::<KilnError>() {
        Ok(kiln) => return record_kiln_error(&kiln, out),
        Err(payload) => payload,
    };
    let message = payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str));
    match message {
        Some(message) => {
            warn!("boundary call panicked: {message}");
            record_error(
                ErrorDomain::Kiln,
                KilnErrorCode::AssertionFailed as i32,
                out,
            );
        }
        None => record_unknown_exception(out),
    }
}

fn exception_record(err: &(dyn Error + 'static)) -> ErrorRecord {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(kiln) = err.downcast_ref::<KilnError>() {
            return kiln.record();
        }
        if let Some(storage) = err.downcast_ref::<StorageError>() {
            return storage_error_record(storage);
        }
        if let Some(io) = err.downcast_ref::<io::Error>() {
            if let Some(errno) = io.raw_os_error() {
                return ErrorRecord::new(ErrorDomain::Posix, errno);
            }
            if io.kind() == io::ErrorKind::OutOfMemory {
                return ErrorRecord::kiln(KilnErrorCode::MemoryError);
            }
        }
        current = err.source();
    }
    ErrorRecord::kiln(KilnErrorCode::InternalException)
}

/// Returns a description of `{domain, code}`.
#[must_use]
pub fn error_message(record: ErrorRecord) -> String {
    if record.code == 0 {
        return "no error".to_string();
    }
    match record.domain {
        ErrorDomain::None => format!("unknown error {}", record.code),
        ErrorDomain::Kiln => match KilnErrorCode::from_raw(record.code) {
            Some(code) => code.message().to_string(),
            None => format!("unknown Kiln error {}", record.code),
        },
        ErrorDomain::Engine => format!("storage engine error {}", record.code),
        ErrorDomain::Posix => io::Error::from_raw_os_error(record.code).to_string(),
        ErrorDomain::Http => format!("HTTP status {}", record.code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Wrapped(KilnError);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "wrapped")
        }
    }

    impl Error for Wrapped {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[derive(Debug)]
    struct Opaque;

    impl fmt::Display for Opaque {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "opaque")
        }
    }

    impl Error for Opaque {}

    fn run<T>(body: impl FnOnce() -> Result<T, BoxError>) -> (Option<T>, ErrorRecord) {
        let mut record = ErrorRecord::NONE;
        let value = catch_error(Some(&mut record), body);
        (value, record)
    }

    #[test]
    fn null_slot_is_a_no_op() {
        record_error(ErrorDomain::Kiln, 1, None);
        record_http_error(404, None);
        record_unknown_exception(None);
        clear_error(None);
        assert_eq!(catch_error(None, || Err::<(), _>(Opaque.into())), None);
    }

    #[test]
    fn success_leaves_slot_untouched() {
        let mut record = ErrorRecord::new(ErrorDomain::Http, 418);
        let value = catch_error(Some(&mut record), || Ok(7));
        assert_eq!(value, Some(7));
        assert_eq!(record, ErrorRecord::new(ErrorDomain::Http, 418));
    }

    #[test]
    fn clear_writes_sentinel() {
        let mut record = ErrorRecord::kiln(KilnErrorCode::Conflict);
        clear_error(Some(&mut record));
        assert_eq!(record, ErrorRecord::NONE);
    }

    #[test]
    fn typed_error_keeps_its_code() {
        let (value, record) = run(|| Err::<(), _>(KilnError::NotInTransaction.into()));
        assert!(value.is_none());
        assert_eq!(record, ErrorRecord::kiln(KilnErrorCode::NotInTransaction));
    }

    #[test]
    fn typed_panic_wins_over_generic_catch() {
        let (_, record) = run(|| -> Result<(), BoxError> {
            panic::panic_any(KilnError::TransactionNotClosed)
        });
        assert_eq!(record, ErrorRecord::kiln(KilnErrorCode::TransactionNotClosed));
    }

    #[test]
    fn storage_error_value_is_recorded_generically() {
        let (_, record) = run(|| Err::<(), _>(StorageError::ReadOnly.into()));
        assert_eq!(
            record,
            ErrorRecord::new(ErrorDomain::Engine, StorageError::ReadOnly.code())
        );
    }

    #[test]
    fn generic_error_finds_typed_source() {
        let (_, record) = run(|| Err::<(), _>(Wrapped(KilnError::NotInTransaction).into()));
        assert_eq!(record, ErrorRecord::kiln(KilnErrorCode::NotInTransaction));
    }

    #[test]
    fn io_error_keeps_errno() {
        let (_, record) = run(|| Err::<(), _>(io::Error::from_raw_os_error(28).into()));
        assert_eq!(record, ErrorRecord::new(ErrorDomain::Posix, 28));
    }

    #[test]
    fn out_of_memory_is_memory_error() {
        let (_, record) = run(|| {
            Err::<(), _>(io::Error::new(io::ErrorKind::OutOfMemory, "alloc").into())
        });
        assert_eq!(record, ErrorRecord::kiln(KilnErrorCode::MemoryError));
    }

    #[test]
    fn opaque_error_is_internal_exception() {
        let (_, record) = run(|| Err::<(), _>(Opaque.into()));
        assert_eq!(record, ErrorRecord::kiln(KilnErrorCode::InternalException));
    }

    #[test]
    fn panic_message_is_assertion_failure() {
        let (_, record) = run(|| -> Result<(), BoxError> { panic!("index out of range") });
        assert_eq!(record, ErrorRecord::kiln(KilnErrorCode::AssertionFailed));
    }

    #[test]
    fn unrecognized_panic_is_unexpected_error() {
        let (_, record) = run(|| -> Result<(), BoxError> { panic::panic_any(42u64) });
        assert_eq!(record, ErrorRecord::kiln(KilnErrorCode::UnexpectedError));
    }

    #[test]
    fn http_table() {
        assert_eq!(
            http_status_to_error(404),
            (ErrorDomain::Kiln, KilnErrorCode::NotFound as i32)
        );
        assert_eq!(
            http_status_to_error(403),
            (ErrorDomain::Kiln, KilnErrorCode::NotAllowed as i32)
        );
        assert_eq!(
            http_status_to_error(503),
            (ErrorDomain::Kiln, KilnErrorCode::RemoteError as i32)
        );
        assert_eq!(http_status_to_error(418), (ErrorDomain::Http, 418));
        assert_eq!(http_status_to_error(601), (ErrorDomain::Http, 601));

        let mut record = ErrorRecord::NONE;
        record_http_error(409, Some(&mut record));
        assert_eq!(record, ErrorRecord::kiln(KilnErrorCode::Conflict));
    }

    #[test]
    fn non_error_statuses_still_record_a_failure() {
        for status in [0, -1, 200, 204, 302, 399] {
            let (domain, code) = http_status_to_error(status);
            assert_eq!(
                (domain, code),
                (ErrorDomain::Kiln, KilnErrorCode::RemoteError as i32),
                "status {status}"
            );
        }

        let (value, record) = run(|| Err::<(), _>(KilnError::from_http_status(0).into()));
        assert!(value.is_none());
        assert!(record.is_error());
        assert_eq!(record, ErrorRecord::kiln(KilnErrorCode::RemoteError));
    }

    #[test]
    fn messages() {
        assert_eq!(error_message(ErrorRecord::NONE), "no error");
        assert_eq!(
            error_message(ErrorRecord::kiln(KilnErrorCode::NotInTransaction)),
            "not in a transaction"
        );
        assert_eq!(
            error_message(ErrorRecord::new(ErrorDomain::Http, 418)),
            "HTTP status 418"
        );
        assert!(!error_message(ErrorRecord::new(ErrorDomain::Posix, 2)).is_empty());
    }
}
