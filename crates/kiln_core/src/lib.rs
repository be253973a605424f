//! # Kiln Core
//!
//! The concurrency-safety and lifecycle layer that sits between a document
//! storage engine and callers reached through a flat C boundary.
//!
//! This crate provides:
//! - Reference-counted objects with live-object accounting ([`RefCounted`],
//!   [`Retained`], [`object_count`])
//! - Nested, single-writer transactions with cross-thread blocking
//!   ([`TransactionCoordinator`])
//! - Translation of every internal fault into an [`ErrorRecord`]
//!   ([`catch_error`] and the `record_*` functions)
//! - The [`Database`] handle and its document enumerator with an
//!   injectable filter
//!
//! ## Thread safety
//!
//! With the default `threadsafe` feature a [`Database`] may be shared across
//! threads. Transactions are single-threaded: once a thread has begun one,
//! other threads calling [`Database::begin_transaction`] block until it
//! ends. Without the feature all locking is compiled out and `Database` is
//! not `Sync`.
//!
//! ## Lock ordering
//!
//! Two locks guard a database: the re-entrant transaction lock and the
//! exclusive data lock. The transaction lock is always taken first. Neither
//! lock is reachable from outside the crate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod database;
mod enumerator;
mod error;
#[allow(unsafe_code)]
mod lifecycle;
mod recorder;
mod sync;
mod transaction;

pub use database::{Database, DatabaseHandle};
pub use enumerator::{DocEnumerator, EnumFilter, EnumeratorFlags};
pub use error::{ErrorDomain, ErrorRecord, KilnError, KilnErrorCode, KilnResult};
pub use lifecycle::{object_count, InstanceCounted, RefCounted, Retained};
pub use recorder::{
    catch_error, clear_error, error_message, http_status_to_error, record_error,
    record_exception, record_http_error, record_kiln_error, record_unknown_exception, BoxError,
};
pub use transaction::{TransactionCoordinator, TransactionStats, TransactionStatsSnapshot};

pub use kiln_storage::{
    DatabaseFlags, Document, DocumentFlags, EncryptionAlgorithm, EncryptionKey, EngineConfig,
    MemoryEngine, StorageEngine, StorageError, TransactionId,
};
