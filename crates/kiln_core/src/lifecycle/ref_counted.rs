use super::counter::InstanceCounted;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{self, AtomicI32, Ordering};
use tracing::{error, warn};

/// A heap object with an intrusive, atomic reference count.
///
/// The count starts at zero. [`retain`](Self::retain) increments it and
/// [`release`](Self::release) decrements it; the release that takes the
/// count from 1 to 0 destroys the object. Releasing past zero is logged and
/// otherwise ignored.
///
/// Destroying an object whose count is still positive is a fatal
/// programming error and aborts the process.
pub struct RefCounted<T> {
    ref_count: AtomicI32,
    _counted: InstanceCounted,
    value: T,
}

impl<T> RefCounted<T> {
    /// Allocates `value` with a reference count of zero.
    ///
    /// The returned pointer is owned by nobody until the first retain. An
    /// object that is never retained is never freed.
    #[must_use]
    pub fn create(value: T) -> NonNull<Self> {
        let boxed = Box::new(Self {
            ref_count: AtomicI32::new(0),
            _counted: InstanceCounted::new(),
            value,
        });
        NonNull::from(Box::leak(boxed))
    }

    /// Returns the current reference count.
    #[must_use]
    pub fn ref_count(&self) -> i32 {
        self.ref_count.load(Ordering::Relaxed)
    }

    /// Increments the reference count and returns the same pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`create`](Self::create) and the object must
    /// not have been destroyed.
    pub unsafe fn retain(ptr: NonNull<Self>) -> NonNull<Self> {
        // A new reference can only be made from an existing one, so no
        // ordering with other memory is needed here.
        ptr.as_ref().ref_count.fetch_add(1, Ordering::Relaxed);
        ptr
    }

    /// Decrements the reference count, destroying the object at zero.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`create`](Self::create) and the object must
    /// not have been destroyed. If this call destroys it, `ptr` and every
    /// copy of it dangle afterwards.
    pub unsafe fn release(ptr: NonNull<Self>) {
        let previous = ptr.as_ref().ref_count.fetch_sub(1, Ordering::Release);
        if previous == 1 {
            // Pairs with the Release above on every other thread so that
            // their writes happen before the destructor runs.
            atomic::fence(Ordering::Acquire);
            drop(Box::from_raw(ptr.as_ptr()));
        } else if previous < 1 {
            warn!(
                ref_count = previous - 1,
                "release of object with no outstanding references"
            );
        }
    }
}

impl<T> Deref for RefCounted<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Drop for RefCounted<T> {
    fn drop(&mut self) {
        let count = *self.ref_count.get_mut();
        if count > 0 {
            error!(
                ref_count = count,
                "destroying object that still has references"
            );
            std::process::abort();
        }
    }
}
