//! Resolver that looks symbols up in a shared library with `dlsym`.
//!
//! Lookups go through the library handle, never the global scope, so the
//! trampolines exported by this crate cannot resolve to themselves.

use std::ffi::{CStr, CString, c_void};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr::NonNull;

use capishim_core::{Resolver, ShimError};

/// An opened shared library plus an optional name prefix.
///
/// With a prefix, `PyList_New` is looked up as `<prefix>PyList_New`, for
/// runtimes that export the API under a namespaced name.
#[derive(Debug)]
pub struct LibraryResolver {
    handle: NonNull<c_void>,
    path: String,
    prefix: Option<Vec<u8>>,
}

// SAFETY: dl handles may be used from any thread; the struct is read-only
// after construction.
unsafe impl Send for LibraryResolver {}
unsafe impl Sync for LibraryResolver {}

impl LibraryResolver {
    /// `dlopen` the library at `path` with `RTLD_NOW | RTLD_LOCAL`.
    pub fn open(path: &Path) -> Result<Self, ShimError> {
        let display = path.display().to_string();
        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| ShimError::Library {
            path: display.clone(),
            message: "path contains a NUL byte".to_string(),
        })?;

        // SAFETY: `c_path` is NUL-terminated; flags are valid for dlopen.
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        match NonNull::new(handle) {
            Some(handle) => Ok(Self {
                handle,
                path: display,
                prefix: None,
            }),
            None => Err(ShimError::Library {
                path: display,
                message: last_dl_error(),
            }),
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = (!prefix.is_empty()).then(|| prefix.as_bytes().to_vec());
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    fn lookup(&self, name: &CStr) -> Option<NonNull<c_void>> {
        // SAFETY: the handle is open until drop and `name` is NUL-terminated.
        NonNull::new(unsafe { libc::dlsym(self.handle.as_ptr(), name.as_ptr()) })
    }
}

impl Resolver for LibraryResolver {
    fn resolve(&self, name: &CStr) -> Option<NonNull<c_void>> {
        match &self.prefix {
            None => self.lookup(name),
            Some(prefix) => {
                let mut full = prefix.clone();
                full.extend_from_slice(name.to_bytes());
                self.lookup(&CString::new(full).ok()?)
            }
        }
    }
}

impl Drop for LibraryResolver {
    fn drop(&mut self) {
        // SAFETY: the handle came from a successful dlopen and is closed once.
        unsafe { libc::dlclose(self.handle.as_ptr()) };
    }
}

fn last_dl_error() -> String {
    // SAFETY: dlerror returns null or a NUL-terminated thread-local message.
    let message = unsafe { libc::dlerror() };
    if message.is_null() {
        "unknown dlopen failure".to_string()
    } else {
        // SAFETY: non-null dlerror results are valid C strings.
        unsafe { CStr::from_ptr(message) }
            .to_string_lossy()
            .into_owned()
    }
}
