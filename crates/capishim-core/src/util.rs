//! Shared internal helpers.

use std::ffi::c_char;

/// Borrow the bytes of a C string, reading at most `limit` bytes.
///
/// Returns the bytes before the first NUL (or the first `limit` bytes) and
/// whether the string was cut short by the bound.
///
/// # Safety
///
/// `ptr` must be non-null and readable up to the returned length plus the
/// terminator, or up to `limit` bytes when no terminator is found earlier.
pub(crate) unsafe fn bounded_c_str<'a>(ptr: *const c_char, limit: usize) -> (&'a [u8], bool) {
    let bytes = ptr.cast::<u8>();
    let mut len = 0usize;
    while len < limit {
        // SAFETY: caller guarantees readability up to the terminator or `limit`.
        if unsafe { *bytes.add(len) } == 0 {
            // SAFETY: the `len` bytes before the terminator were just read.
            return (unsafe { std::slice::from_raw_parts(bytes, len) }, false);
        }
        len += 1;
    }
    // SAFETY: `limit` bytes were read above.
    (unsafe { std::slice::from_raw_parts(bytes, limit) }, true)
}
