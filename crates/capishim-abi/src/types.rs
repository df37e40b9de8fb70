//! C-API types as seen by the trampolines.
//!
//! The shim never looks inside API objects, so every struct is opaque and
//! only ever handled behind a pointer.

#![allow(non_camel_case_types)]

use std::ffi::{c_int, c_void};
use std::marker::{PhantomData, PhantomPinned};

use capishim_core::ArgRepr;
use capishim_core::log::describe_addr;

macro_rules! opaque_types {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[repr(C)]
            pub struct $name {
                _data: [u8; 0],
                _marker: PhantomData<(*mut u8, PhantomPinned)>,
            }
        )*
    };
}

opaque_types! {
    /// Any API object.
    PyObject;
    PyTypeObject;
    PyThreadState;
    PyModuleDef;
    /// Cached keyword-parser state used by the `Fast` argument parsers.
    _PyArg_Parser;
}

pub type Py_ssize_t = isize;
pub type Py_hash_t = isize;
pub type Py_UCS4 = u32;
pub type PyGILState_STATE = c_int;

/// A `va_list` parameter, forwarded without being read.
///
/// Every supported target passes a `va_list` function parameter as a single
/// pointer (to the register save area, or to the argument block), so the
/// handle is ABI-compatible with the C type in parameter position.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaListPtr(*mut c_void);

impl VaListPtr {
    #[must_use]
    pub const fn from_raw(raw: *mut c_void) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_raw(self) -> *mut c_void {
        self.0
    }
}

impl ArgRepr for VaListPtr {
    unsafe fn repr(&self) -> Option<String> {
        Some(format!("va_list@{}", describe_addr(self.0.addr())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn va_list_handle_is_one_pointer() {
        assert_eq!(size_of::<VaListPtr>(), size_of::<*mut c_void>());
        assert_eq!(align_of::<VaListPtr>(), align_of::<*mut c_void>());
    }

    #[test]
    fn va_list_handle_renders_its_address() {
        let va = VaListPtr::from_raw(std::ptr::without_provenance_mut(0x1000));
        assert_eq!(unsafe { va.repr() }.unwrap(), "va_list@0x1000");
        assert_eq!(va.as_raw().addr(), 0x1000);
    }

    #[test]
    fn object_pointers_render_as_hex() {
        let obj: *mut PyObject = std::ptr::without_provenance_mut(0xBEEF);
        assert_eq!(unsafe { obj.repr() }.unwrap(), "0xbeef");
    }
}
