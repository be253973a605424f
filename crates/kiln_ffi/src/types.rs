//! Type definitions for FFI.

use kiln_core::{ErrorDomain, ErrorRecord};
use kiln_storage::{EncryptionAlgorithm, EncryptionKey, KEY_SIZE};
use std::ffi::c_void;

/// An opaque database handle.
///
/// Points at the reference-counted database. Never dereference or modify
/// directly.
#[repr(C)]
pub struct KilnDatabase {
    _private: [u8; 0],
}

/// A caller-visible error: `{domain, code}`.
///
/// `code == 0` means no error. Domains: 0 none, 1 Kiln, 2 storage engine,
/// 3 POSIX errno, 4 HTTP status.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KilnError {
    /// The error domain.
    pub domain: u32,
    /// The code within the domain.
    pub code: i32,
}

impl From<ErrorRecord> for KilnError {
    fn from(record: ErrorRecord) -> Self {
        Self {
            domain: record.domain as u32,
            code: record.code,
        }
    }
}

impl KilnError {
    /// Converts back into a record, mapping unknown domains to none.
    pub fn to_record(self) -> ErrorRecord {
        let domain = ErrorDomain::from_raw(self.domain).unwrap_or_default();
        ErrorRecord::new(domain, self.code)
    }
}

/// A borrowed byte range. A null `buf` is the empty slice.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct KilnSlice {
    /// Pointer to the first byte.
    pub buf: *const u8,
    /// Length in bytes.
    pub size: usize,
}

impl KilnSlice {
    /// The empty slice.
    pub const NULL: Self = Self {
        buf: std::ptr::null(),
        size: 0,
    };

    /// Borrows `bytes` as a slice.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            buf: bytes.as_ptr(),
            size: bytes.len(),
        }
    }

    /// Returns the bytes.
    ///
    /// # Safety
    ///
    /// `buf` must be null or point to `size` readable bytes that outlive
    /// `'a`.
    pub unsafe fn as_bytes<'a>(self) -> &'a [u8] {
        if self.buf.is_null() {
            return &[];
        }
        std::slice::from_raw_parts(self.buf, self.size)
    }
}

impl From<&str> for KilnSlice {
    fn from(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

/// An encryption key.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct KilnEncryptionKey {
    /// 0 for none, 1 for AES-256.
    pub algorithm: u32,
    /// Key bytes.
    pub bytes: [u8; KEY_SIZE],
}

impl KilnEncryptionKey {
    /// Converts to the engine's key type, or `None` for an unknown
    /// algorithm.
    pub fn to_key(&self) -> Option<EncryptionKey> {
        let algorithm = EncryptionAlgorithm::from_raw(self.algorithm)?;
        Some(EncryptionKey::new(algorithm, self.bytes))
    }
}

/// A document as seen by C code.
///
/// All slices borrow from the enumerator and stay valid until the next
/// `kiln_enum_next` or `kiln_enum_free` on it.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct KilnDocumentInfo {
    /// Document ID.
    pub doc_id: KilnSlice,
    /// Document type tag.
    pub doc_type: KilnSlice,
    /// Body; empty unless bodies were requested.
    pub body: KilnSlice,
    /// Document flags.
    pub flags: u32,
    /// Sequence of the last committed change.
    pub sequence: u64,
}

impl KilnDocumentInfo {
    /// Borrows `doc`'s fields.
    pub fn borrow(doc: &kiln_storage::Document) -> Self {
        Self {
            doc_id: KilnSlice::from(doc.doc_id()),
            doc_type: KilnSlice::from(doc.doc_type()),
            body: KilnSlice::from_bytes(doc.body()),
            flags: doc.flags().bits(),
            sequence: doc.sequence(),
        }
    }

    /// An info with every slice empty.
    pub fn empty() -> Self {
        Self {
            doc_id: KilnSlice::NULL,
            doc_type: KilnSlice::NULL,
            body: KilnSlice::NULL,
            flags: 0,
            sequence: 0,
        }
    }
}

/// A filter callback for `kiln_enum_set_filter`.
///
/// Receives the caller's context, the candidate document, its flags and its
/// type tag. Return `true` to yield the document. The callback must not
/// unwind.
pub type KilnEnumFilter = extern "C" fn(
    context: *mut c_void,
    doc: *const KilnDocumentInfo,
    flags: u32,
    doc_type: KilnSlice,
) -> bool;
