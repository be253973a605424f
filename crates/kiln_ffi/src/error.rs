//! The catch-and-translate boundary and error helpers.

use crate::buffer::KilnSliceResult;
use crate::types::KilnError;
use kiln_core::{catch_error, BoxError, ErrorRecord};

/// Runs a boundary body.
///
/// The output slot, if any, ends up cleared on success and describing the
/// fault otherwise. Nothing unwinds past this call.
///
/// # Safety
///
/// `out_error` must be null or valid for writes.
pub(crate) unsafe fn boundary<T>(
    out_error: *mut KilnError,
    body: impl FnOnce() -> Result<T, BoxError>,
) -> Option<T> {
    let mut record = ErrorRecord::NONE;
    let value = catch_error(Some(&mut record), body);
    if let Some(out) = out_error.as_mut() {
        *out = record.into();
    }
    value
}

/// Returns a description of `error`. Free it with `kiln_slice_free`.
#[no_mangle]
pub extern "C" fn kiln_error_message(error: KilnError) -> KilnSliceResult {
    let message = kiln_core::error_message(error.to_record());
    KilnSliceResult::from_vec(message.into_bytes())
}

/// Translates an HTTP-style status into an error.
#[no_mangle]
pub extern "C" fn kiln_error_from_http_status(status: i32) -> KilnError {
    let (domain, code) = kiln_core::http_status_to_error(status);
    ErrorRecord::new(domain, code).into()
}
