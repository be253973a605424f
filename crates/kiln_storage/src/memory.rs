//! In-memory storage engine.

use crate::config::{DatabaseFlags, EngineConfig};
use crate::document::Document;
use crate::engine::{StorageEngine, TransactionId};
use crate::error::{StorageError, StorageResult};
use crate::key::EncryptionKey;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

/// Stores shared by every engine open on the same path in this process.
///
/// Entries are weak: a store lives while at least one engine holds it.
static REGISTRY: Mutex<BTreeMap<PathBuf, Weak<Mutex<MemoryStore>>>> =
    parking_lot::const_mutex(BTreeMap::new());

#[derive(Debug, Default)]
struct MemoryStore {
    docs: BTreeMap<String, Document>,
    last_sequence: u64,
    key: Option<EncryptionKey>,
}

#[derive(Debug)]
struct PendingTransaction {
    id: TransactionId,
    writes: BTreeMap<String, Document>,
}

/// An in-memory storage engine.
///
/// Databases live in a process-wide registry keyed by path, so opening a
/// path that another engine still has open sees what it committed. Once
/// the last engine on a path is dropped its data is gone. This backend is
/// suitable for:
/// - Unit and integration tests
/// - Ephemeral databases that don't need persistence
///
/// It honours [`DatabaseFlags::CREATE`] and [`DatabaseFlags::READ_ONLY`]
/// and checks the encryption key on reopen; the other flags are accepted
/// and ignored.
///
/// # Example
///
/// ```rust
/// use kiln_storage::{EngineConfig, MemoryEngine, StorageEngine};
///
/// let missing = MemoryEngine::open("never-created.kiln", &EngineConfig::new());
/// assert!(missing.is_err());
///
/// let engine = MemoryEngine::open("created.kiln", &EngineConfig::new().create(true)).unwrap();
/// assert_eq!(engine.document_count().unwrap(), 0);
/// ```
#[derive(Debug)]
pub struct MemoryEngine {
    path: PathBuf,
    store: Arc<Mutex<MemoryStore>>,
    read_only: bool,
    pending: Option<PendingTransaction>,
    next_txid: u64,
    closed: bool,
}

impl MemoryEngine {
    /// Opens (or creates) the in-memory database registered under `path`.
    ///
    /// # Errors
    ///
    /// - [`StorageError::DatabaseNotFound`] if the path is unknown and
    ///   `CREATE` is not set (or `READ_ONLY` is set)
    /// - [`StorageError::WrongKey`] if the key differs from the stored one
    pub fn open(path: impl AsRef<Path>, config: &EngineConfig) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let key = config
            .encryption_key
            .clone()
            .filter(EncryptionKey::is_encrypting);
        let read_only = config.flags.contains(DatabaseFlags::READ_ONLY);

        let mut registry = REGISTRY.lock();
        registry.retain(|_, store| store.strong_count() > 0);
        let store = match registry.get(&path).and_then(Weak::upgrade) {
            Some(store) => {
                if store.lock().key != key {
                    return Err(StorageError::WrongKey);
                }
                store
            }
            None => {
                if read_only || !config.flags.contains(DatabaseFlags::CREATE) {
                    return Err(StorageError::DatabaseNotFound {
                        path: path.display().to_string(),
                    });
                }
                let store = Arc::new(Mutex::new(MemoryStore {
                    key,
                    ..MemoryStore::default()
                }));
                registry.insert(path.clone(), Arc::downgrade(&store));
                store
            }
        };

        Ok(Self {
            path,
            store,
            read_only,
            pending: None,
            next_txid: 1,
            closed: false,
        })
    }

    /// Returns the registry path this engine was opened on.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn take_pending(&mut self, txn: TransactionId) -> StorageResult<PendingTransaction> {
        match self.pending.take() {
            Some(pending) if pending.id == txn => Ok(pending),
            other => {
                self.pending = other;
                Err(StorageError::UnknownTransaction(txn.as_u64()))
            }
        }
    }
}

impl Drop for MemoryEngine {
    fn drop(&mut self) {
        // Upgrades only happen under the registry lock, so a count of one
        // here means no other engine can pick this store up.
        let mut registry = REGISTRY.lock();
        if Arc::strong_count(&self.store) == 1 {
            registry.remove(&self.path);
        }
    }
}

impl StorageEngine for MemoryEngine {
    fn begin_transaction(&mut self) -> StorageResult<TransactionId> {
        self.ensure_open()?;
        if self.pending.is_some() {
            return Err(StorageError::TransactionOpen);
        }
        let id = TransactionId::new(self.next_txid);
        self.next_txid += 1;
        self.pending = Some(PendingTransaction {
            id,
            writes: BTreeMap::new(),
        });
        Ok(id)
    }

    fn commit_transaction(&mut self, txn: TransactionId) -> StorageResult<()> {
        self.ensure_open()?;
        let pending = self.take_pending(txn)?;

        let mut store = self.store.lock();
        for (doc_id, doc) in pending.writes {
            store.last_sequence += 1;
            let sequence = store.last_sequence;
            store.docs.insert(doc_id, doc.with_sequence(sequence));
        }
        Ok(())
    }

    fn abort_transaction(&mut self, txn: TransactionId) -> StorageResult<()> {
        self.ensure_open()?;
        self.take_pending(txn).map(drop)
    }

    fn get(&self, doc_id: &str) -> StorageResult<Option<Document>> {
        self.ensure_open()?;
        Ok(self.store.lock().docs.get(doc_id).cloned())
    }

    fn get_in_transaction(
        &self,
        txn: TransactionId,
        doc_id: &str,
    ) -> StorageResult<Option<Document>> {
        self.ensure_open()?;
        match &self.pending {
            Some(pending) if pending.id == txn => match pending.writes.get(doc_id) {
                Some(doc) => Ok(Some(doc.clone())),
                None => self.get(doc_id),
            },
            _ => Err(StorageError::UnknownTransaction(txn.as_u64())),
        }
    }

    fn put(&mut self, txn: TransactionId, doc: Document) -> StorageResult<()> {
        self.ensure_open()?;
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        match self.pending.as_mut() {
            Some(pending) if pending.id == txn => {
                pending.writes.insert(doc.doc_id().to_string(), doc);
                Ok(())
            }
            _ => Err(StorageError::UnknownTransaction(txn.as_u64())),
        }
    }

    fn documents(&self) -> StorageResult<Vec<Document>> {
        self.ensure_open()?;
        Ok(self.store.lock().docs.values().cloned().collect())
    }

    fn document_count(&self) -> StorageResult<u64> {
        self.ensure_open()?;
        let count = self
            .store
            .lock()
            .docs
            .values()
            .filter(|doc| !doc.is_deleted())
            .count();
        Ok(count as u64)
    }

    fn last_sequence(&self) -> u64 {
        self.store.lock().last_sequence
    }

    fn rekey(&mut self, key: Option<&EncryptionKey>) -> StorageResult<()> {
        self.ensure_open()?;
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        self.store.lock().key = key.filter(|k| k.is_encrypting()).cloned();
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        self.ensure_open()?;
        self.pending = None;
        self.closed = true;
        Ok(())
    }
}
