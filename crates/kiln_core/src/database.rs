//! The database handle.

use crate::enumerator::{DocEnumerator, EnumeratorFlags};
use crate::error::{ErrorRecord, KilnError, KilnResult};
use crate::lifecycle::Retained;
use crate::transaction::{TransactionCoordinator, TransactionStats};
use kiln_storage::{
    DatabaseFlags, Document, EncryptionKey, EngineConfig, MemoryEngine, StorageEngine,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// A reference-counted, shareable database handle.
///
/// This is what crosses the C boundary. Dropping the last handle destroys
/// the database.
pub type DatabaseHandle = Retained<Database>;

/// An open database.
///
/// Reads go straight to the engine under the data lock. Writes need an open
/// transaction:
///
/// ```rust
/// use kiln_core::{Database, Document, EngineConfig};
///
/// let dir = tempfile::tempdir().unwrap();
/// let db = Database::open(dir.path().join("doc.kiln"), &EngineConfig::new().create(true)).unwrap();
///
/// db.transaction(|db| db.put(Document::new("greeting", "note", b"hello".to_vec())))
///     .unwrap();
///
/// assert_eq!(db.document_count().unwrap(), 1);
/// ```
///
/// With the `threadsafe` feature a `Database` is `Sync`. Transactions are
/// single-threaded: while one thread has a transaction open, other threads
/// block in [`begin_transaction`](Self::begin_transaction).
pub struct Database {
    path: PathBuf,
    flags: DatabaseFlags,
    coordinator: TransactionCoordinator,
    open: AtomicBool,
}

impl Database {
    /// Opens the database at `path` on the in-memory engine.
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot open the path with `config`.
    pub fn open(path: impl AsRef<Path>, config: &EngineConfig) -> KilnResult<Self> {
        let path = path.as_ref();
        let engine = MemoryEngine::open(path, config)?;
        Ok(Self::open_with_engine(path, config, Box::new(engine)))
    }

    /// Wraps an already opened engine.
    pub fn open_with_engine(
        path: impl AsRef<Path>,
        config: &EngineConfig,
        engine: Box<dyn StorageEngine>,
    ) -> Self {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), flags = ?config.flags, "opened database");
        Self {
            path,
            flags: config.flags,
            coordinator: TransactionCoordinator::new(engine),
            open: AtomicBool::new(true),
        }
    }

    /// Moves the database into a reference-counted handle.
    #[must_use]
    pub fn into_handle(self) -> DatabaseHandle {
        Retained::from_value(self)
    }

    /// Returns the path the database was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the flags the database was opened with.
    pub fn flags(&self) -> DatabaseFlags {
        self.flags
    }

    /// Returns false once [`close`](Self::close) has succeeded.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    // === Transactions ===

    /// Begins a transaction or nests inside the calling thread's open one.
    ///
    /// Blocks while another thread has a transaction open.
    pub fn begin_transaction(&self) -> KilnResult<()> {
        self.coordinator.begin_transaction()
    }

    /// Ends one level of the calling thread's transaction.
    ///
    /// Only the outermost end commits or aborts.
    pub fn end_transaction(&self, commit: bool) -> KilnResult<()> {
        self.coordinator.end_transaction(commit)
    }

    /// Returns true if a transaction is open. Does not block.
    pub fn in_transaction(&self) -> bool {
        self.coordinator.in_transaction()
    }

    /// Returns the current nesting depth. Does not block.
    pub fn transaction_depth(&self) -> u32 {
        self.coordinator.depth()
    }

    /// Records [`KilnError::NotInTransaction`] and returns false unless the
    /// calling thread has a transaction open.
    pub fn must_be_in_transaction(&self, out: Option<&mut ErrorRecord>) -> bool {
        self.coordinator.must_be_in_transaction(out)
    }

    /// Records [`KilnError::TransactionNotClosed`] and returns false if the
    /// calling thread has a transaction open.
    pub fn must_not_be_in_transaction(&self, out: Option<&mut ErrorRecord>) -> bool {
        self.coordinator.must_not_be_in_transaction(out)
    }

    /// Runs `f` inside a transaction.
    ///
    /// Commits if `f` returns `Ok` and aborts otherwise, including when `f`
    /// panics. Nests inside an already open transaction on the calling
    /// thread.
    pub fn transaction<F, T>(&self, f: F) -> KilnResult<T>
    where
        F: FnOnce(&Self) -> KilnResult<T>,
    {
        self.begin_transaction()?;
        let _unwind = AbortOnUnwind(self);
        match f(self) {
            Ok(value) => {
                self.end_transaction(true)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort) = self.end_transaction(false) {
                    warn!("abort after failed transaction body also failed: {abort}");
                }
                Err(e)
            }
        }
    }

    /// Returns the transaction counters.
    pub fn transaction_stats(&self) -> &TransactionStats {
        self.coordinator.stats()
    }

    // === Documents ===

    /// Reads a committed document, tombstones included.
    pub fn get(&self, doc_id: &str) -> KilnResult<Option<Document>> {
        self.coordinator.with_engine(|engine| engine.get(doc_id))
    }

    /// Writes a document in the calling thread's transaction.
    ///
    /// # Errors
    ///
    /// - [`KilnError::InvalidParameter`] for an empty document ID
    /// - [`KilnError::NotInTransaction`] outside a transaction
    pub fn put(&self, doc: Document) -> KilnResult<()> {
        if doc.doc_id().is_empty() {
            return Err(KilnError::invalid_parameter("document ID is empty"));
        }
        self.coordinator
            .with_transaction(|engine, txn| engine.put(txn, doc))
    }

    /// Replaces a live document with a tombstone.
    ///
    /// A document written earlier in the same transaction counts as live.
    ///
    /// # Errors
    ///
    /// - [`KilnError::NotFound`] if no live document has this ID
    /// - [`KilnError::NotInTransaction`] outside a transaction
    pub fn delete(&self, doc_id: &str) -> KilnResult<()> {
        let deleted = self.coordinator.with_transaction(|engine, txn| {
            match engine.get_in_transaction(txn, doc_id)? {
                Some(existing) if !existing.is_deleted() => {
                    engine.put(txn, Document::tombstone(doc_id))?;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })?;
        if !deleted {
            return Err(KilnError::NotFound(doc_id.to_string()));
        }
        Ok(())
    }

    /// Returns the number of live documents.
    pub fn document_count(&self) -> KilnResult<u64> {
        self.coordinator.with_engine(|engine| engine.document_count())
    }

    /// Returns the sequence of the most recent committed change.
    pub fn last_sequence(&self) -> u64 {
        self.coordinator
            .with_engine(|engine| Ok(engine.last_sequence()))
            .unwrap_or_default()
    }

    /// Snapshots the committed documents into an enumerator.
    pub fn enumerate(&self, flags: EnumeratorFlags) -> KilnResult<DocEnumerator> {
        let docs = self.coordinator.with_engine(|engine| engine.documents())?;
        Ok(DocEnumerator::new(docs, flags))
    }

    // === Maintenance ===

    /// Changes the encryption key; `None` removes encryption.
    ///
    /// # Errors
    ///
    /// [`KilnError::TransactionNotClosed`] while a transaction is open.
    pub fn rekey(&self, key: Option<&EncryptionKey>) -> KilnResult<()> {
        self.coordinator.with_engine_idle(|engine| engine.rekey(key))?;
        debug!(path = %self.path.display(), encrypted = key.is_some(), "rekeyed database");
        Ok(())
    }

    /// Closes the engine. Closing twice is a no-op.
    ///
    /// Later document operations fail with a "not open" error.
    ///
    /// # Errors
    ///
    /// [`KilnError::TransactionNotClosed`] while a transaction is open.
    pub fn close(&self) -> KilnResult<()> {
        if !self.is_open() {
            return Ok(());
        }
        // Checked again under the locks so racing closes see one winner.
        let closed = self.coordinator.with_engine_idle(|engine| {
            if !self.is_open() {
                return Ok(false);
            }
            engine.close()?;
            self.open.store(false, Ordering::Release);
            Ok(true)
        })?;
        if closed {
            debug!(path = %self.path.display(), "closed database");
        }
        Ok(())
    }
}

/// Ends the transaction opened by [`Database::transaction`] with an abort
/// if its body panics.
struct AbortOnUnwind<'a>(&'a Database);

impl Drop for AbortOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            if let Err(e) = self.0.end_transaction(false) {
                warn!("abort after panicking transaction body failed: {e}");
            }
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("flags", &self.flags)
            .field("open", &self.is_open())
            .field("coordinator", &self.coordinator)
            .finish()
    }
}
