//! The two locks that guard a database.
//!
//! - [`TxnLock`] is exclusive across threads but re-entrant on the thread
//!   that holds it, and a hold can outlive the call that took it
//!   ([`TxnGuard::persist`]). It guards transaction bookkeeping.
//! - [`DataLock`] is plain exclusive and not re-entrant. It guards the
//!   storage engine.
//!
//! When both are needed the transaction lock is taken first. Debug builds
//! check this per thread.
//!
//! Without the `threadsafe` feature both locks compile down to `RefCell`
//! and `Cell` bookkeeping with no blocking, and neither type is `Sync`.

use std::cell::Cell;
use std::ops::{Deref, DerefMut};

#[cfg(feature = "threadsafe")]
use parking_lot::{Condvar, Mutex, MutexGuard};
#[cfg(feature = "threadsafe")]
use std::thread::{self, ThreadId};

#[cfg(not(feature = "threadsafe"))]
use std::cell::{RefCell, RefMut};

thread_local! {
    static DATA_LOCKS_HELD: Cell<u32> = const { Cell::new(0) };
}

fn data_locks_held() -> u32 {
    DATA_LOCKS_HELD.with(Cell::get)
}

/// Exclusive, non-re-entrant lock around the storage engine.
pub(crate) struct DataLock<T> {
    #[cfg(feature = "threadsafe")]
    inner: Mutex<T>,
    #[cfg(not(feature = "threadsafe"))]
    inner: RefCell<T>,
}

/// Access to the value behind a [`DataLock`].
pub(crate) struct DataGuard<'a, T> {
    #[cfg(feature = "threadsafe")]
    inner: MutexGuard<'a, T>,
    #[cfg(not(feature = "threadsafe"))]
    inner: RefMut<'a, T>,
}

impl<T> DataLock<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            #[cfg(feature = "threadsafe")]
            inner: Mutex::new(value),
            #[cfg(not(feature = "threadsafe"))]
            inner: RefCell::new(value),
        }
    }

    /// Blocks until the lock is free.
    ///
    /// Re-entering from the holding thread deadlocks (or panics without
    /// `threadsafe`).
    pub(crate) fn lock(&self) -> DataGuard<'_, T> {
        #[cfg(feature = "threadsafe")]
        let inner = self.inner.lock();
        #[cfg(not(feature = "threadsafe"))]
        let inner = self.inner.borrow_mut();
        DATA_LOCKS_HELD.with(|held| held.set(held.get() + 1));
        DataGuard { inner }
    }

    pub(crate) fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

impl<T> Deref for DataGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for DataGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T> Drop for DataGuard<'_, T> {
    fn drop(&mut self) {
        DATA_LOCKS_HELD.with(|held| held.set(held.get().saturating_sub(1)));
    }
}

#[cfg(feature = "threadsafe")]
struct Owned<S> {
    thread: Option<ThreadId>,
    holds: u32,
    state: S,
}

/// Re-entrant lock around transaction bookkeeping `S`.
///
/// One thread at a time owns the lock; it may take it again any number of
/// times and owns it until every hold is released. Other threads block in
/// [`lock`](Self::lock) until then.
pub(crate) struct TxnLock<S> {
    #[cfg(feature = "threadsafe")]
    inner: Mutex<Owned<S>>,
    #[cfg(feature = "threadsafe")]
    released: Condvar,

    #[cfg(not(feature = "threadsafe"))]
    state: RefCell<S>,
    #[cfg(not(feature = "threadsafe"))]
    holds: Cell<u32>,
}

/// One hold on a [`TxnLock`], released on drop unless persisted.
pub(crate) struct TxnGuard<'a, S> {
    lock: &'a TxnLock<S>,
}

impl<S> TxnLock<S> {
    pub(crate) fn new(state: S) -> Self {
        Self {
            #[cfg(feature = "threadsafe")]
            inner: Mutex::new(Owned {
                thread: None,
                holds: 0,
                state,
            }),
            #[cfg(feature = "threadsafe")]
            released: Condvar::new(),
            #[cfg(not(feature = "threadsafe"))]
            state: RefCell::new(state),
            #[cfg(not(feature = "threadsafe"))]
            holds: Cell::new(0),
        }
    }

    /// Takes a hold, blocking while another thread owns the lock.
    pub(crate) fn lock(&self) -> TxnGuard<'_, S> {
        debug_assert!(
            data_locks_held() == 0,
            "lock order: transaction lock taken while holding the data lock"
        );

        #[cfg(feature = "threadsafe")]
        {
            let me = thread::current().id();
            let mut inner = self.inner.lock();
            while inner.thread.is_some_and(|owner| owner != me) {
                self.released.wait(&mut inner);
            }
            inner.thread = Some(me);
            inner.holds += 1;
        }
        #[cfg(not(feature = "threadsafe"))]
        self.holds.set(self.holds.get() + 1);

        TxnGuard { lock: self }
    }

    /// Reads the state without taking a hold.
    ///
    /// The value may be stale by the time it is used unless the caller owns
    /// the lock.
    pub(crate) fn peek<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        #[cfg(feature = "threadsafe")]
        {
            f(&self.inner.lock().state)
        }
        #[cfg(not(feature = "threadsafe"))]
        {
            f(&self.state.borrow())
        }
    }

    /// Takes over one hold left behind by [`TxnGuard::persist`].
    ///
    /// The hold is released when the returned guard drops, unwinding
    /// included. Must be called from the owning thread.
    pub(crate) fn adopt_persisted(&self) -> TxnGuard<'_, S> {
        TxnGuard { lock: self }
    }

    pub(crate) fn get_mut(&mut self) -> &mut S {
        #[cfg(feature = "threadsafe")]
        {
            &mut self.inner.get_mut().state
        }
        #[cfg(not(feature = "threadsafe"))]
        {
            self.state.get_mut()
        }
    }

    fn release(&self) {
        #[cfg(feature = "threadsafe")]
        {
            let mut inner = self.inner.lock();
            debug_assert_eq!(inner.thread, Some(thread::current().id()));
            inner.holds = inner.holds.saturating_sub(1);
            if inner.holds == 0 {
                inner.thread = None;
                drop(inner);
                self.released.notify_one();
            }
        }
        #[cfg(not(feature = "threadsafe"))]
        self.holds.set(self.holds.get().saturating_sub(1));
    }

    #[cfg(test)]
    fn holds(&self) -> u32 {
        #[cfg(feature = "threadsafe")]
        {
            self.inner.lock().holds
        }
        #[cfg(not(feature = "threadsafe"))]
        {
            self.holds.get()
        }
    }
}

impl<S> TxnGuard<'_, S> {
    /// Runs `f` on the guarded state.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        #[cfg(feature = "threadsafe")]
        {
            f(&mut self.lock.inner.lock().state)
        }
        #[cfg(not(feature = "threadsafe"))]
        {
            f(&mut self.lock.state.borrow_mut())
        }
    }

    /// Keeps the hold after the guard goes away.
    pub(crate) fn persist(self) {
        std::mem::forget(self);
    }
}

impl<S> Drop for TxnGuard<'_, S> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
