//! Enumerator FFI functions.

use crate::database::database;
use crate::error::boundary;
use crate::types::{KilnDatabase, KilnDocumentInfo, KilnEnumFilter, KilnError, KilnSlice};
use kiln_core::{DocEnumerator, Document, DocumentFlags, EnumeratorFlags, KilnError as CoreError};
use std::ffi::c_void;

/// An opaque enumerator handle.
#[repr(C)]
pub struct KilnEnumerator {
    _private: [u8; 0],
}

/// Internal enumerator state.
struct FfiEnumerator {
    docs: DocEnumerator,
    /// The document last returned; `KilnDocumentInfo` slices borrow it.
    current: Option<Document>,
}

/// The caller's filter context, carried into the filter closure.
struct FilterContext(*mut c_void);

// SAFETY: the caller promises the context may be used from whichever thread
// drives the enumerator.
unsafe impl Send for FilterContext {}

impl FilterContext {
    fn get(&self) -> *mut c_void {
        self.0
    }
}

unsafe fn enumerator<'a>(e: *mut KilnEnumerator) -> Result<&'a mut FfiEnumerator, CoreError> {
    e.cast::<FfiEnumerator>()
        .as_mut()
        .ok_or_else(|| CoreError::invalid_parameter("null enumerator"))
}

/// Creates an enumerator over a snapshot of the database's documents.
///
/// # Arguments
///
/// * `db` - The database handle
/// * `flags` - descending 0x01, include deleted 0x08, include
///   non-conflicted 0x10, include bodies 0x20
/// * `out_error` - optional error output
///
/// # Returns
///
/// An enumerator to free with `kiln_enum_free`, or null on failure.
///
/// # Safety
///
/// `db` must be a live handle; `out_error` null or valid.
#[no_mangle]
pub unsafe extern "C" fn kiln_enum_create(
    db: *mut KilnDatabase,
    flags: u16,
    out_error: *mut KilnError,
) -> *mut KilnEnumerator {
    boundary(out_error, || {
        let flags = EnumeratorFlags::from_bits_truncate(flags);
        let docs = database(db)?.enumerate(flags)?;
        let state = Box::new(FfiEnumerator {
            docs,
            current: None,
        });
        Ok(Box::into_raw(state).cast::<KilnEnumerator>())
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Installs a filter, replacing any earlier one. A null callback removes
/// the filter.
///
/// The callback runs during `kiln_enum_next` on the calling thread.
///
/// # Safety
///
/// `e` must be a live enumerator; `context` must stay valid until the
/// filter is replaced or the enumerator freed.
#[no_mangle]
pub unsafe extern "C" fn kiln_enum_set_filter(
    e: *mut KilnEnumerator,
    callback: Option<KilnEnumFilter>,
    context: *mut c_void,
    out_error: *mut KilnError,
) -> bool {
    boundary(out_error, || {
        let state = enumerator(e)?;
        match callback {
            Some(callback) => {
                let context = FilterContext(context);
                state
                    .docs
                    .set_filter(Box::new(move |doc: &Document, flags: DocumentFlags, doc_type: &str| {
                        let info = KilnDocumentInfo::borrow(doc);
                        callback(context.get(), &info, flags.bits(), KilnSlice::from(doc_type))
                    }));
            }
            None => state.docs.clear_filter(),
        }
        Ok(())
    })
    .is_some()
}

/// Advances to the next document.
///
/// On success fills `out_info` and returns true. At the end returns false
/// with the error slot cleared; on failure returns false with it set.
///
/// # Safety
///
/// `e` must be a live enumerator; `out_info` valid for writes; `out_error`
/// null or valid.
#[no_mangle]
pub unsafe extern "C" fn kiln_enum_next(
    e: *mut KilnEnumerator,
    out_info: *mut KilnDocumentInfo,
    out_error: *mut KilnError,
) -> bool {
    boundary(out_error, || {
        let state = enumerator(e)?;
        let out_info = out_info
            .as_mut()
            .ok_or_else(|| CoreError::invalid_parameter("null document info"))?;

        state.current = state.docs.next();
        *out_info = match &state.current {
            Some(doc) => KilnDocumentInfo::borrow(doc),
            None => KilnDocumentInfo::empty(),
        };
        Ok(state.current.is_some())
    })
    .unwrap_or(false)
}

/// Frees an enumerator. Null is ignored.
///
/// # Safety
///
/// `e` must be null or a live enumerator, not used afterwards.
#[no_mangle]
pub unsafe extern "C" fn kiln_enum_free(e: *mut KilnEnumerator) {
    if !e.is_null() {
        drop(Box::from_raw(e.cast::<FfiEnumerator>()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{
        kiln_db_begin_transaction, kiln_db_end_transaction, kiln_db_open, kiln_db_put,
        kiln_db_release,
    };
    use kiln_core::{DatabaseFlags, ErrorDomain, KilnErrorCode};
    use tempfile::TempDir;

    unsafe fn populated(dir: &TempDir) -> *mut KilnDatabase {
        let path = dir.path().join("enum.kiln");
        let mut error = KilnError::default();
        let db = kiln_db_open(
            KilnSlice::from(path.to_str().unwrap()),
            DatabaseFlags::CREATE.bits(),
            std::ptr::null(),
            &mut error,
        );
        assert!(kiln_db_begin_transaction(db, &mut error));
        for (id, doc_type) in [("a", "note"), ("b", "task"), ("c", "note")] {
            assert!(kiln_db_put(
                db,
                KilnSlice::from(id),
                KilnSlice::from(doc_type),
                KilnSlice::from(id),
                &mut error,
            ));
        }
        assert!(kiln_db_end_transaction(db, true, &mut error));
        db
    }

    unsafe fn collect(e: *mut KilnEnumerator) -> Vec<String> {
        let mut ids = Vec::new();
        let mut info = KilnDocumentInfo::empty();
        let mut error = KilnError::default();
        while kiln_enum_next(e, &mut info, &mut error) {
            let id = std::str::from_utf8(info.doc_id.as_bytes()).unwrap();
            ids.push(id.to_string());
        }
        assert_eq!(error, KilnError::default());
        ids
    }

    extern "C" fn notes_only(
        context: *mut c_void,
        _doc: *const KilnDocumentInfo,
        _flags: u32,
        doc_type: KilnSlice,
    ) -> bool {
        let calls = unsafe { &mut *context.cast::<u32>() };
        *calls += 1;
        (unsafe { doc_type.as_bytes() }) == b"note"
    }

    extern "C" fn reject_all(
        _context: *mut c_void,
        _doc: *const KilnDocumentInfo,
        _flags: u32,
        _doc_type: KilnSlice,
    ) -> bool {
        false
    }

    #[test]
    fn enumerates_in_order() {
        let dir = TempDir::new().unwrap();
        let mut error = KilnError::default();
        unsafe {
            let db = populated(&dir);
            let e = kiln_enum_create(db, EnumeratorFlags::default().bits(), &mut error);
            assert!(!e.is_null());
            assert_eq!(collect(e), ["a", "b", "c"]);
            kiln_enum_free(e);

            let flags = (EnumeratorFlags::default() | EnumeratorFlags::DESCENDING).bits();
            let e = kiln_enum_create(db, flags, &mut error);
            assert_eq!(collect(e), ["c", "b", "a"]);
            kiln_enum_free(e);

            kiln_db_release(db);
        }
    }

    #[test]
    fn bodies_follow_flags() {
        let dir = TempDir::new().unwrap();
        let mut error = KilnError::default();
        let mut info = KilnDocumentInfo::empty();
        unsafe {
            let db = populated(&dir);
            let e = kiln_enum_create(db, EnumeratorFlags::default().bits(), &mut error);
            assert!(kiln_enum_next(e, &mut info, &mut error));
            assert_eq!(info.body.as_bytes(), b"a");
            assert_eq!(info.sequence, 1);
            kiln_enum_free(e);

            let flags = EnumeratorFlags::INCLUDE_NON_CONFLICTED.bits();
            let e = kiln_enum_create(db, flags, &mut error);
            assert!(kiln_enum_next(e, &mut info, &mut error));
            assert!(info.body.as_bytes().is_empty());
            kiln_enum_free(e);

            kiln_db_release(db);
        }
    }

    #[test]
    fn filter_callback_selects_documents() {
        let dir = TempDir::new().unwrap();
        let mut error = KilnError::default();
        let mut calls = 0u32;
        unsafe {
            let db = populated(&dir);
            let e = kiln_enum_create(db, EnumeratorFlags::default().bits(), &mut error);

            assert!(kiln_enum_set_filter(e, Some(reject_all), std::ptr::null_mut(), &mut error));
            let context = std::ptr::addr_of_mut!(calls).cast::<c_void>();
            assert!(kiln_enum_set_filter(e, Some(notes_only), context, &mut error));
            assert_eq!(collect(e), ["a", "c"]);
            kiln_enum_free(e);

            kiln_db_release(db);
        }
        assert_eq!(calls, 3);
    }

    #[test]
    fn null_callback_removes_filter() {
        let dir = TempDir::new().unwrap();
        let mut error = KilnError::default();
        unsafe {
            let db = populated(&dir);
            let e = kiln_enum_create(db, EnumeratorFlags::default().bits(), &mut error);
            assert!(kiln_enum_set_filter(e, Some(reject_all), std::ptr::null_mut(), &mut error));
            assert!(kiln_enum_set_filter(e, None, std::ptr::null_mut(), &mut error));
            assert_eq!(collect(e).len(), 3);
            kiln_enum_free(e);
            kiln_db_release(db);
        }
    }

    #[test]
    fn null_arguments_are_invalid() {
        let mut error = KilnError::default();
        let mut info = KilnDocumentInfo::empty();
        unsafe {
            assert!(kiln_enum_create(std::ptr::null_mut(), 0, &mut error).is_null());
            assert_eq!(error.domain, ErrorDomain::Kiln as u32);
            assert_eq!(error.code, KilnErrorCode::InvalidParameter as i32);

            error = KilnError::default();
            assert!(!kiln_enum_next(std::ptr::null_mut(), &mut info, &mut error));
            assert_eq!(error.code, KilnErrorCode::InvalidParameter as i32);

            kiln_enum_free(std::ptr::null_mut());
        }
    }
}
