//! Storage engine trait definition.

use crate::document::Document;
use crate::error::StorageResult;
use crate::key::EncryptionKey;
use std::fmt;

/// Identifier of an engine-level transaction.
///
/// Handed out by [`StorageEngine::begin_transaction`] and passed back on
/// every write and on commit/abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// A document storage engine.
///
/// Engines are **opaque** to Kiln: their file layout, versioning and
/// compaction are their own business. Kiln only drives the operations
/// below, and it guarantees that:
///
/// - at most one engine transaction is open at a time
/// - `put` is only called with the currently open transaction
/// - no two calls are made concurrently (the engine sits behind Kiln's
///   data lock), so implementations need `Send` but not `Sync`
pub trait StorageEngine: Send {
    /// Opens a new transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction is already open or the engine
    /// cannot start one.
    fn begin_transaction(&mut self) -> StorageResult<TransactionId>;

    /// Commits the given transaction, making its writes durable and visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is unknown or the commit fails.
    /// The transaction is closed either way.
    fn commit_transaction(&mut self, txn: TransactionId) -> StorageResult<()>;

    /// Aborts the given transaction, discarding its writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is unknown.
    fn abort_transaction(&mut self, txn: TransactionId) -> StorageResult<()>;

    /// Reads the committed state of a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be read.
    fn get(&self, doc_id: &str) -> StorageResult<Option<Document>>;

    /// Reads a document as transaction `txn` sees it: its own pending write
    /// if it made one, the committed state otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is unknown or the engine cannot
    /// be read.
    fn get_in_transaction(
        &self,
        txn: TransactionId,
        doc_id: &str,
    ) -> StorageResult<Option<Document>>;

    /// Writes a document within an open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is unknown or the engine is
    /// read-only.
    fn put(&mut self, txn: TransactionId, doc: Document) -> StorageResult<()>;

    /// Returns a snapshot of every committed document, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be read.
    fn documents(&self) -> StorageResult<Vec<Document>>;

    /// Returns the number of live (non-deleted) documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be read.
    fn document_count(&self) -> StorageResult<u64>;

    /// Returns the last committed sequence number.
    fn last_sequence(&self) -> u64;

    /// Replaces the encryption key, or removes encryption with `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is read-only or cannot re-encrypt.
    fn rekey(&mut self, key: Option<&EncryptionKey>) -> StorageResult<()>;

    /// Closes the engine. Later calls fail with [`StorageError::Closed`].
    ///
    /// [`StorageError::Closed`]: crate::StorageError::Closed
    ///
    /// # Errors
    ///
    /// Returns an error if pending state cannot be flushed.
    fn close(&mut self) -> StorageResult<()>;
}
