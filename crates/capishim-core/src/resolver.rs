//! Symbol resolution: name in, callable address out.

use std::collections::HashMap;
use std::ffi::{CStr, c_char, c_void};
use std::ptr::NonNull;

use parking_lot::Mutex;

/// Host lookup service used to bind trampolines to real implementations.
///
/// Implementations return `None` when the host does not provide `name`.
/// The registry calls `resolve` at most once per symbol after a success.
pub trait Resolver: Send + Sync {
    fn resolve(&self, name: &CStr) -> Option<NonNull<c_void>>;
}

impl<F> Resolver for F
where
    F: Fn(&CStr) -> Option<NonNull<c_void>> + Send + Sync,
{
    fn resolve(&self, name: &CStr) -> Option<NonNull<c_void>> {
        self(name)
    }
}

/// C signature of the host-provided lookup callback.
pub type ResolveFn = unsafe extern "C" fn(name: *const c_char) -> *mut c_void;

/// Resolver backed by a host C callback.
#[derive(Debug, Clone, Copy)]
pub struct HostResolver {
    callback: ResolveFn,
}

impl HostResolver {
    /// Wrap a host callback.
    ///
    /// # Safety
    ///
    /// `callback` must accept any NUL-terminated name for the lifetime of
    /// the resolver and return null or the address of a function whose
    /// signature matches the symbol of that name.
    #[must_use]
    pub const unsafe fn new(callback: ResolveFn) -> Self {
        Self { callback }
    }
}

impl Resolver for HostResolver {
    fn resolve(&self, name: &CStr) -> Option<NonNull<c_void>> {
        // SAFETY: guaranteed by the contract of `HostResolver::new`.
        NonNull::new(unsafe { (self.callback)(name.as_ptr()) })
    }
}

#[derive(Debug, Clone, Copy)]
struct FnAddr(NonNull<c_void>);

// SAFETY: code addresses are immutable and valid from any thread.
unsafe impl Send for FnAddr {}
unsafe impl Sync for FnAddr {}

/// In-memory name table, used by tests, benches and embedders that bind
/// from Rust.
///
/// Counts every lookup per name so callers can assert how often the
/// registry consulted it.
#[derive(Debug, Default)]
pub struct TableResolver {
    table: HashMap<String, FnAddr>,
    lookups: Mutex<HashMap<String, u64>>,
}

impl TableResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `addr` under `name`. Null addresses are ignored.
    ///
    /// The caller is responsible for `addr` having the signature the
    /// symbol is declared with.
    pub fn insert(&mut self, name: &str, addr: *const ()) -> &mut Self {
        if let Some(addr) = NonNull::new(addr.cast_mut().cast::<c_void>()) {
            self.table.insert(name.to_string(), FnAddr(addr));
        }
        self
    }

    #[must_use]
    pub fn with(mut self, name: &str, addr: *const ()) -> Self {
        self.insert(name, addr);
        self
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// How many times `name` was looked up, found or not.
    #[must_use]
    pub fn lookups(&self, name: &str) -> u64 {
        self.lookups.lock().get(name).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_lookups(&self) -> u64 {
        self.lookups.lock().values().sum()
    }
}

impl Resolver for TableResolver {
    fn resolve(&self, name: &CStr) -> Option<NonNull<c_void>> {
        let name = name.to_string_lossy();
        *self.lookups.lock().entry(name.to_string()).or_default() += 1;
        self.table.get(name.as_ref()).map(|addr| addr.0)
    }
}
