//! Transaction counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Transaction statistics for one database.
///
/// All counters are atomic, monotonically increasing, and can be read while
/// transactions are in progress.
#[derive(Debug, Default)]
pub struct TransactionStats {
    /// Outermost transactions opened against the engine.
    began: AtomicU64,
    /// Nested begins that only incremented the depth.
    nested: AtomicU64,
    /// Outermost ends that committed.
    committed: AtomicU64,
    /// Outermost ends that aborted.
    aborted: AtomicU64,
    /// Begins, commits and aborts the engine refused.
    failed: AtomicU64,
}

impl TransactionStats {
    /// Creates a zeroed stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_begin(&self) {
        self.began.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_nested(&self) {
        self.nested.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of outermost transactions opened.
    pub fn began(&self) -> u64 {
        self.began.load(Ordering::Relaxed)
    }

    /// Returns the number of nested begins.
    pub fn nested(&self) -> u64 {
        self.nested.load(Ordering::Relaxed)
    }

    /// Returns the number of committed transactions.
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    /// Returns the number of aborted transactions.
    pub fn aborted(&self) -> u64 {
        self.aborted.load(Ordering::Relaxed)
    }

    /// Returns the number of engine failures on begin, commit or abort.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> TransactionStatsSnapshot {
        TransactionStatsSnapshot {
            began: self.began(),
            nested: self.nested(),
            committed: self.committed(),
            aborted: self.aborted(),
            failed: self.failed(),
        }
    }
}

/// A point-in-time copy of [`TransactionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionStatsSnapshot {
    /// Outermost transactions opened.
    pub began: u64,
    /// Nested begins.
    pub nested: u64,
    /// Committed transactions.
    pub committed: u64,
    /// Aborted transactions.
    pub aborted: u64,
    /// Engine failures.
    pub failed: u64,
}
