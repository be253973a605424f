//! The per-database transaction state machine.

use super::stats::TransactionStats;
use crate::error::{ErrorRecord, KilnError, KilnResult};
use crate::recorder::record_kiln_error;
use crate::sync::{DataLock, TxnLock};
use kiln_storage::{StorageEngine, StorageResult, TransactionId};
use tracing::{debug, error, trace};

/// Nesting depth and the engine transaction it belongs to.
///
/// `depth == 0` exactly when `active` is `None`.
#[derive(Debug, Default)]
struct TxnState {
    depth: u32,
    active: Option<TransactionId>,
}

/// Arbitrates transactions on one storage engine.
///
/// ## States
///
/// - **Idle**: depth 0, no engine transaction.
/// - **Active**: depth >= 1, one engine transaction owned by one thread.
///
/// The owning thread holds the transaction lock from its outermost
/// [`begin_transaction`](Self::begin_transaction) until the matching
/// [`end_transaction`](Self::end_transaction). Other threads that try to
/// begin block until then.
///
/// Engine access outside a transaction goes through the data lock only.
/// Writes take the transaction lock first, then the data lock.
pub struct TransactionCoordinator {
    txn_lock: TxnLock<TxnState>,
    data: DataLock<Box<dyn StorageEngine>>,
    stats: TransactionStats,
}

impl TransactionCoordinator {
    /// Creates an idle coordinator over `engine`.
    pub fn new(engine: Box<dyn StorageEngine>) -> Self {
        Self {
            txn_lock: TxnLock::new(TxnState::default()),
            data: DataLock::new(engine),
            stats: TransactionStats::new(),
        }
    }

    /// Begins a transaction, or nests inside the calling thread's open one.
    ///
    /// Blocks while another thread has a transaction open.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if it cannot open a transaction. The
    /// coordinator stays idle and the call may be retried.
    pub fn begin_transaction(&self) -> KilnResult<()> {
        let guard = self.txn_lock.lock();

        if guard.with_state(|state| state.depth) == 0 {
            let txn = match self.data.lock().begin_transaction() {
                Ok(txn) => txn,
                Err(e) => {
                    self.stats.record_failure();
                    return Err(e.into());
                }
            };
            guard.with_state(|state| {
                state.depth = 1;
                state.active = Some(txn);
            });
            self.stats.record_begin();
            debug!(%txn, "began transaction");
        } else {
            let depth = guard.with_state(|state| {
                state.depth += 1;
                state.depth
            });
            self.stats.record_nested();
            trace!(depth, "nested transaction");
        }

        // Each begin keeps one hold until its matching end.
        guard.persist();
        Ok(())
    }

    /// Ends one level of the calling thread's transaction.
    ///
    /// Only the outermost end reaches the engine, committing or aborting
    /// per `commit`; inner ends just decrement the depth and ignore
    /// `commit`.
    ///
    /// # Errors
    ///
    /// - [`KilnError::NotInTransaction`] if no transaction is open
    /// - the engine's error if the commit or abort fails; the coordinator
    ///   is idle afterwards either way
    pub fn end_transaction(&self, commit: bool) -> KilnResult<()> {
        let guard = self.txn_lock.lock();

        let (depth, active) = guard.with_state(|state| {
            if state.depth == 0 {
                return (0, None);
            }
            state.depth -= 1;
            let active = if state.depth == 0 {
                state.active.take()
            } else {
                None
            };
            (state.depth + 1, active)
        });

        if depth == 0 {
            return Err(KilnError::NotInTransaction);
        }
        // The hold taken by the matching begin; released even if the engine
        // panics below.
        let _begun = self.txn_lock.adopt_persisted();

        match active {
            Some(txn) => self.finish(txn, commit),
            None => {
                trace!(depth = depth - 1, "ended nested transaction");
                Ok(())
            }
        }
    }

    fn finish(&self, txn: TransactionId, commit: bool) -> KilnResult<()> {
        let mut engine = self.data.lock();
        let result = if commit {
            engine.commit_transaction(txn)
        } else {
            engine.abort_transaction(txn)
        };
        drop(engine);

        match result {
            Ok(()) if commit => {
                self.stats.record_commit();
                debug!(%txn, "committed transaction");
                Ok(())
            }
            Ok(()) => {
                self.stats.record_abort();
                debug!(%txn, "aborted transaction");
                Ok(())
            }
            Err(e) => {
                self.stats.record_failure();
                debug!(%txn, commit, "ending transaction failed: {e}");
                Err(e.into())
            }
        }
    }

    /// Returns true if any thread has a transaction open.
    ///
    /// Does not block.
    pub fn in_transaction(&self) -> bool {
        self.depth() > 0
    }

    /// Returns the current nesting depth. Does not block.
    pub fn depth(&self) -> u32 {
        self.txn_lock.peek(|state| state.depth)
    }

    /// Returns the open engine transaction, if any. Does not block.
    pub fn active_transaction(&self) -> Option<TransactionId> {
        self.txn_lock.peek(|state| state.active)
    }

    /// Checks that the calling thread has a transaction open.
    ///
    /// On failure records [`KilnError::NotInTransaction`] into `out` and
    /// returns false.
    pub fn must_be_in_transaction(&self, out: Option<&mut ErrorRecord>) -> bool {
        Self::guard_result(self.require_transaction(), out)
    }

    /// Checks that the calling thread has no transaction open.
    ///
    /// On failure records [`KilnError::TransactionNotClosed`] into `out`
    /// and returns false.
    pub fn must_not_be_in_transaction(&self, out: Option<&mut ErrorRecord>) -> bool {
        Self::guard_result(self.require_no_transaction(), out)
    }

    fn guard_result(result: KilnResult<()>, out: Option<&mut ErrorRecord>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                record_kiln_error(&e, out);
                false
            }
        }
    }

    /// Returns the transaction counters.
    pub fn stats(&self) -> &TransactionStats {
        &self.stats
    }

    /// Fails unless the calling thread has a transaction open.
    ///
    /// Taking the transaction lock means another thread's transaction is
    /// waited out rather than mistaken for this thread's.
    pub(crate) fn require_transaction(&self) -> KilnResult<()> {
        let guard = self.txn_lock.lock();
        if guard.with_state(|state| state.depth) == 0 {
            return Err(KilnError::NotInTransaction);
        }
        Ok(())
    }

    pub(crate) fn require_no_transaction(&self) -> KilnResult<()> {
        let guard = self.txn_lock.lock();
        if guard.with_state(|state| state.depth) != 0 {
            return Err(KilnError::TransactionNotClosed);
        }
        Ok(())
    }

    /// Runs `f` on the engine under the data lock only.
    pub(crate) fn with_engine<R>(
        &self,
        f: impl FnOnce(&mut dyn StorageEngine) -> StorageResult<R>,
    ) -> KilnResult<R> {
        let mut engine = self.data.lock();
        Ok(f(&mut **engine)?)
    }

    /// Runs `f` inside the calling thread's open transaction.
    pub(crate) fn with_transaction<R>(
        &self,
        f: impl FnOnce(&mut dyn StorageEngine, TransactionId) -> StorageResult<R>,
    ) -> KilnResult<R> {
        let guard = self.txn_lock.lock();
        let txn = guard
            .with_state(|state| state.active)
            .ok_or(KilnError::NotInTransaction)?;
        let mut engine = self.data.lock();
        Ok(f(&mut **engine, txn)?)
    }

    /// Runs `f` on the engine while no transaction is open.
    ///
    /// Holding the transaction lock for the whole call keeps another thread
    /// from beginning one underneath it.
    pub(crate) fn with_engine_idle<R>(
        &self,
        f: impl FnOnce(&mut dyn StorageEngine) -> StorageResult<R>,
    ) -> KilnResult<R> {
        let guard = self.txn_lock.lock();
        if guard.with_state(|state| state.depth) != 0 {
            return Err(KilnError::TransactionNotClosed);
        }
        let mut engine = self.data.lock();
        Ok(f(&mut **engine)?)
    }
}

impl Drop for TransactionCoordinator {
    fn drop(&mut self) {
        let state = std::mem::take(self.txn_lock.get_mut());
        if let Some(txn) = state.active {
            error!(
                %txn,
                depth = state.depth,
                "database destroyed inside a transaction; aborting it"
            );
            if let Err(e) = self.data.get_mut().abort_transaction(txn) {
                error!(%txn, "abort of dangling transaction failed: {e}");
            }
        }
    }
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("depth", &self.depth())
            .field("active", &self.active_transaction())
            .finish_non_exhaustive()
    }
}
