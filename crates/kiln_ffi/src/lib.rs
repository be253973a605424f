//! # Kiln FFI
//!
//! Stable C ABI for Kiln.
//!
//! Every exported function is a boundary call: it never unwinds into the
//! caller. Functions that can fail return `false` (or a null pointer, or an
//! empty [`KilnSliceResult`]) and describe the failure in an optional
//! caller-owned [`KilnError`]. On success that slot is cleared.
//!
//! ## Ownership
//!
//! - A [`KilnDatabase`] is reference-counted. `kiln_db_open` returns it with
//!   one reference; `kiln_db_retain` adds one and `kiln_db_release` drops
//!   one. The last release destroys it.
//! - A [`KilnEnumerator`] has a single owner and is freed with
//!   `kiln_enum_free`.
//! - A [`KilnSliceResult`] is Rust-allocated and freed with
//!   `kiln_slice_free`.
//! - A [`KilnSlice`] is borrowed for the duration of the call only.

#![warn(missing_docs)]

mod buffer;
mod database;
mod enumerator;
mod error;
mod types;

pub use buffer::{kiln_slice_free, KilnSliceResult};
pub use database::*;
pub use enumerator::*;
pub use error::{kiln_error_from_http_status, kiln_error_message};
pub use types::{
    KilnDatabase, KilnDocumentInfo, KilnEncryptionKey, KilnEnumFilter, KilnError, KilnSlice,
};
