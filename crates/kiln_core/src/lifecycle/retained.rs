use super::ref_counted::RefCounted;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;

/// An owning handle to a [`RefCounted`] object.
///
/// Holds exactly one reference, released when the handle is dropped. The
/// handle is deliberately not `Clone`; a second owner is made with
/// [`Retained::new`] on the [raw pointer](Retained::as_ptr).
pub struct Retained<T> {
    ptr: NonNull<RefCounted<T>>,
    _marker: PhantomData<RefCounted<T>>,
}

impl<T> Retained<T> {
    /// Allocates `value` and returns the sole handle to it.
    #[must_use]
    pub fn from_value(value: T) -> Self {
        let ptr = RefCounted::create(value);
        // SAFETY: freshly created, and this handle takes the one reference.
        unsafe { Self::adopt(RefCounted::retain(ptr)) }
    }

    /// Retains `ptr` and wraps it in a new handle.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live object on which the caller holds a
    /// reference for the duration of this call.
    #[must_use]
    pub unsafe fn new(ptr: NonNull<RefCounted<T>>) -> Self {
        debug_assert!(
            ptr.as_ref().ref_count() >= 1,
            "retaining an object nobody owns"
        );
        Self::adopt(RefCounted::retain(ptr))
    }

    /// Wraps `ptr` without retaining it, taking over one existing
    /// reference.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live object and the caller must own one of its
    /// references, which passes to the handle.
    #[must_use]
    pub unsafe fn adopt(ptr: NonNull<RefCounted<T>>) -> Self {
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    /// Gives up the handle without releasing its reference.
    ///
    /// The reference must eventually be handed back through
    /// [`adopt`](Self::adopt) or released with [`RefCounted::release`].
    #[must_use]
    pub fn into_raw(this: Self) -> NonNull<RefCounted<T>> {
        let ptr = this.ptr;
        std::mem::forget(this);
        ptr
    }

    /// Returns the raw pointer without affecting the count.
    #[must_use]
    pub fn as_ptr(this: &Self) -> NonNull<RefCounted<T>> {
        this.ptr
    }

    /// Returns the object's current reference count.
    #[must_use]
    pub fn ref_count(this: &Self) -> i32 {
        this.counted().ref_count()
    }

    fn counted(&self) -> &RefCounted<T> {
        // SAFETY: the handle's reference keeps the object alive.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> Deref for Retained<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.counted()
    }
}

impl<T> Drop for Retained<T> {
    fn drop(&mut self) {
        // SAFETY: the handle owns one reference on a live object.
        unsafe { RefCounted::release(self.ptr) }
    }
}

impl<T: fmt::Debug> fmt::Debug for Retained<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retained")
            .field("ref_count", &Retained::ref_count(self))
            .field("value", &**self)
            .finish()
    }
}

// SAFETY: the count is atomic, so handles on different threads may retain
// and release concurrently as long as the value itself can be shared.
unsafe impl<T: Send + Sync> Send for Retained<T> {}
unsafe impl<T: Send + Sync> Sync for Retained<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_value_holds_one_reference() {
        let handle = Retained::from_value(String::from("kiln"));
        assert_eq!(Retained::ref_count(&handle), 1);
        assert_eq!(handle.as_str(), "kiln");
    }

    #[test]
    fn second_handle_shares_object() {
        let first = Retained::from_value(vec![1, 2, 3]);
        let second = unsafe { Retained::new(Retained::as_ptr(&first)) };
        assert_eq!(Retained::ref_count(&first), 2);
        assert_eq!(second.len(), 3);

        drop(first);
        assert_eq!(Retained::ref_count(&second), 1);
    }

    #[test]
    fn into_raw_and_adopt_round_trip() {
        let handle = Retained::from_value(7u32);
        let raw = Retained::into_raw(handle);
        unsafe {
            assert_eq!(raw.as_ref().ref_count(), 1);
            let handle = Retained::adopt(raw);
            assert_eq!(*handle, 7);
        }
    }
}
