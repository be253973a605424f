//! Database FFI functions.

use crate::buffer::KilnSliceResult;
use crate::error::boundary;
use crate::types::{KilnDatabase, KilnEncryptionKey, KilnError, KilnSlice};
use kiln_core::{
    object_count, BoxError, Database, DatabaseFlags, Document, EncryptionKey, EngineConfig,
    KilnError as CoreError, RefCounted, Retained,
};
use std::ptr::NonNull;
use tracing::warn;

type Counted = RefCounted<Database>;

/// Borrows the database behind a handle.
///
/// # Safety
///
/// `db` must be null or a live handle from `kiln_db_open`.
pub(crate) unsafe fn database<'a>(db: *mut KilnDatabase) -> Result<&'a Database, BoxError> {
    match NonNull::new(db.cast::<Counted>()) {
        Some(ptr) => Ok(&**ptr.as_ref()),
        None => Err(CoreError::invalid_parameter("null database handle").into()),
    }
}

/// Reads a UTF-8 string argument.
///
/// # Safety
///
/// See [`KilnSlice::as_bytes`].
pub(crate) unsafe fn utf8<'a>(slice: KilnSlice, what: &str) -> Result<&'a str, BoxError> {
    std::str::from_utf8(slice.as_bytes())
        .map_err(|_| CoreError::invalid_parameter(format!("{what} is not UTF-8")).into())
}

unsafe fn key_arg(key: *const KilnEncryptionKey) -> Result<Option<EncryptionKey>, BoxError> {
    match key.as_ref() {
        None => Ok(None),
        Some(key) => key
            .to_key()
            .map(Some)
            .ok_or_else(|| CoreError::invalid_parameter("unknown encryption algorithm").into()),
    }
}

/// Opens a database.
///
/// # Arguments
///
/// * `path` - UTF-8 path
/// * `flags` - open flags (create 0x1, read-only 0x2, auto-compact 0x4,
///   bundled 0x8)
/// * `key` - encryption key, or null for none
/// * `out_error` - optional error output
///
/// # Returns
///
/// A handle holding one reference, or null on failure.
///
/// # Safety
///
/// - `path` must be readable
/// - `key` and `out_error` must be null or valid
#[no_mangle]
pub unsafe extern "C" fn kiln_db_open(
    path: KilnSlice,
    flags: u32,
    key: *const KilnEncryptionKey,
    out_error: *mut KilnError,
) -> *mut KilnDatabase {
    boundary(out_error, || {
        let path = utf8(path, "path")?;
        if path.is_empty() {
            return Err(CoreError::invalid_parameter("empty path").into());
        }
        let flags = DatabaseFlags::from_bits_retain(flags);
        let config = EngineConfig::from_parts(flags, key_arg(key)?);
        let handle = Database::open(path, &config)?.into_handle();
        Ok(Retained::into_raw(handle).as_ptr().cast::<KilnDatabase>())
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Adds a reference to a database. Returns `db`.
///
/// # Safety
///
/// `db` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn kiln_db_retain(db: *mut KilnDatabase) -> *mut KilnDatabase {
    if let Some(ptr) = NonNull::new(db.cast::<Counted>()) {
        Counted::retain(ptr);
    }
    db
}

/// Drops a reference to a database, destroying it with the last one.
///
/// # Safety
///
/// `db` must be null or a live handle; the caller's reference is consumed.
#[no_mangle]
pub unsafe extern "C" fn kiln_db_release(db: *mut KilnDatabase) {
    match NonNull::new(db.cast::<Counted>()) {
        Some(ptr) => Counted::release(ptr),
        None => warn!("kiln_db_release called with null handle"),
    }
}

/// Closes the database. Fails while a transaction is open.
///
/// The handle stays valid and must still be released.
///
/// # Safety
///
/// `db` must be a live handle; `out_error` null or valid.
#[no_mangle]
pub unsafe extern "C" fn kiln_db_close(db: *mut KilnDatabase, out_error: *mut KilnError) -> bool {
    boundary(out_error, || Ok(database(db)?.close()?)).is_some()
}

/// Changes the encryption key; a null key removes encryption.
///
/// # Safety
///
/// `db` must be a live handle; `key` and `out_error` null or valid.
#[no_mangle]
pub unsafe extern "C" fn kiln_db_rekey(
    db: *mut KilnDatabase,
    key: *const KilnEncryptionKey,
    out_error: *mut KilnError,
) -> bool {
    boundary(out_error, || {
        let key = key_arg(key)?;
        Ok(database(db)?.rekey(key.as_ref())?)
    })
    .is_some()
}

/// Begins a transaction, nesting inside this thread's open one.
///
/// Blocks while another thread has a transaction open.
///
/// # Safety
///
/// `db` must be a live handle; `out_error` null or valid.
#[no_mangle]
pub unsafe extern "C" fn kiln_db_begin_transaction(
    db: *mut KilnDatabase,
    out_error: *mut KilnError,
) -> bool {
    boundary(out_error, || Ok(database(db)?.begin_transaction()?)).is_some()
}

/// Ends one level of this thread's transaction. Only the outermost end
/// commits or aborts.
///
/// # Safety
///
/// `db` must be a live handle; `out_error` null or valid.
#[no_mangle]
pub unsafe extern "C" fn kiln_db_end_transaction(
    db: *mut KilnDatabase,
    commit: bool,
    out_error: *mut KilnError,
) -> bool {
    boundary(out_error, || Ok(database(db)?.end_transaction(commit)?)).is_some()
}

/// Returns true if a transaction is open. False for a null handle.
///
/// # Safety
///
/// `db` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn kiln_db_is_in_transaction(db: *mut KilnDatabase) -> bool {
    database(db).is_ok_and(Database::in_transaction)
}

/// Writes a document. Requires an open transaction.
///
/// # Safety
///
/// `db` must be a live handle; slices readable; `out_error` null or valid.
#[no_mangle]
pub unsafe extern "C" fn kiln_db_put(
    db: *mut KilnDatabase,
    doc_id: KilnSlice,
    doc_type: KilnSlice,
    body: KilnSlice,
    out_error: *mut KilnError,
) -> bool {
    boundary(out_error, || {
        let db = database(db)?;
        let doc = Document::new(
            utf8(doc_id, "document ID")?,
            utf8(doc_type, "document type")?,
            body.as_bytes().to_vec(),
        );
        Ok(db.put(doc)?)
    })
    .is_some()
}

/// Reads a live document's body.
///
/// Returns a null result with a "not found" error if the document does not
/// exist or is deleted. Free the result with `kiln_slice_free`.
///
/// # Safety
///
/// `db` must be a live handle; `doc_id` readable; `out_error` null or valid.
#[no_mangle]
pub unsafe extern "C" fn kiln_db_get(
    db: *mut KilnDatabase,
    doc_id: KilnSlice,
    out_error: *mut KilnError,
) -> KilnSliceResult {
    boundary(out_error, || {
        let doc_id = utf8(doc_id, "document ID")?;
        match database(db)?.get(doc_id)? {
            Some(doc) if !doc.is_deleted() => Ok(KilnSliceResult::from_vec(doc.body().to_vec())),
            _ => Err(CoreError::NotFound(doc_id.to_string()).into()),
        }
    })
    .unwrap_or_else(KilnSliceResult::null)
}

/// Deletes a live document. Requires an open transaction.
///
/// # Safety
///
/// `db` must be a live handle; `doc_id` readable; `out_error` null or valid.
#[no_mangle]
pub unsafe extern "C" fn kiln_db_delete(
    db: *mut KilnDatabase,
    doc_id: KilnSlice,
    out_error: *mut KilnError,
) -> bool {
    boundary(out_error, || {
        let doc_id = utf8(doc_id, "document ID")?;
        Ok(database(db)?.delete(doc_id)?)
    })
    .is_some()
}

/// Returns the number of live documents, or 0 on error.
///
/// # Safety
///
/// `db` must be a live handle; `out_error` null or valid.
#[no_mangle]
pub unsafe extern "C" fn kiln_db_document_count(
    db: *mut KilnDatabase,
    out_error: *mut KilnError,
) -> u64 {
    boundary(out_error, || Ok(database(db)?.document_count()?)).unwrap_or(0)
}

/// Returns the sequence of the most recent committed change. 0 for a null
/// handle.
///
/// # Safety
///
/// `db` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn kiln_db_last_sequence(db: *mut KilnDatabase) -> u64 {
    database(db).map_or(0, Database::last_sequence)
}

/// Returns the number of live Kiln objects in the process.
#[no_mangle]
pub extern "C" fn kiln_object_count() -> i64 {
    object_count()
}
