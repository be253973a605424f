use std::sync::atomic::{AtomicI64, Ordering};

static OBJECT_COUNT: AtomicI64 = AtomicI64::new(0);

/// Returns the number of counted objects currently alive in the process.
///
/// Intended for leak checks: take a reading, run a workload, and compare.
#[must_use]
pub fn object_count() -> i64 {
    OBJECT_COUNT.load(Ordering::Relaxed)
}

/// A token that adds one to [`object_count`] while it exists.
///
/// Embed it in a type to have instances of that type counted. Cloning
/// produces a new token, so a cloned owner is counted separately.
#[derive(Debug)]
pub struct InstanceCounted(());

impl InstanceCounted {
    /// Creates a token, incrementing the live-object count.
    #[must_use]
    pub fn new() -> Self {
        OBJECT_COUNT.fetch_add(1, Ordering::Relaxed);
        Self(())
    }
}

impl Default for InstanceCounted {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InstanceCounted {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl Drop for InstanceCounted {
    fn drop(&mut self) {
        OBJECT_COUNT.fetch_sub(1, Ordering::Relaxed);
    }
}
