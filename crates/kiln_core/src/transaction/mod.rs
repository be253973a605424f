//! Nested, single-writer transactions.
//!
//! A database has at most one open transaction. The thread that opened it
//! may nest further begin/end pairs; only the outermost end commits or
//! aborts. Any other thread that begins a transaction blocks until the
//! nesting depth returns to zero.

mod coordinator;
mod stats;

pub use coordinator::TransactionCoordinator;
pub use stats::{TransactionStats, TransactionStatsSnapshot};
