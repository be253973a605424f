//! Rust-owned byte buffers.

/// Bytes allocated by Kiln and owned by the caller.
///
/// A null `buf` means no result. Call `kiln_slice_free` to release.
#[repr(C)]
#[derive(Debug)]
pub struct KilnSliceResult {
    /// Pointer to data.
    pub buf: *mut u8,
    /// Length in bytes.
    pub size: usize,
}

impl KilnSliceResult {
    /// Hands `bytes` over to the caller.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let boxed = bytes.into_boxed_slice();
        let size = boxed.len();
        let buf = Box::into_raw(boxed).cast::<u8>();
        Self { buf, size }
    }

    /// The "no result" value.
    pub fn null() -> Self {
        Self {
            buf: std::ptr::null_mut(),
            size: 0,
        }
    }

    /// Returns true if this carries no result.
    pub fn is_null(&self) -> bool {
        self.buf.is_null()
    }
}

/// Frees bytes returned by Kiln. Null is ignored.
///
/// # Safety
///
/// `slice` must come from a Kiln function and not have been freed.
#[no_mangle]
pub unsafe extern "C" fn kiln_slice_free(slice: KilnSliceResult) {
    if !slice.buf.is_null() {
        let raw = std::ptr::slice_from_raw_parts_mut(slice.buf, slice.size);
        drop(Box::from_raw(raw));
    }
}
