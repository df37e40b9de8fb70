//! Symbol declarations and the per-symbol registry entry.

use std::ffi::{CStr, c_void};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::stats::StatsNode;

/// Slot value while one thread runs the resolver for the entry.
///
/// Address 1 is never a valid function address and is distinct from null.
pub(crate) const RESOLVING: *mut c_void = ptr::without_provenance_mut(1);

/// Index of a symbol in its registry (declaration order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Whether the shadowed function may return to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Contract {
    Returns,
    /// Documented as never returning (process exit, fatal error, thread exit).
    NoReturn,
    /// Exported for link compatibility only; calling it exits the process.
    Unimplemented,
}

/// Compile-time description of one exported symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolDecl {
    pub name: &'static CStr,
    pub contract: Contract,
}

impl SymbolDecl {
    #[must_use]
    pub const fn forward(name: &'static CStr) -> Self {
        Self {
            name,
            contract: Contract::Returns,
        }
    }

    #[must_use]
    pub const fn noreturn(name: &'static CStr) -> Self {
        Self {
            name,
            contract: Contract::NoReturn,
        }
    }

    #[must_use]
    pub const fn unimplemented(name: &'static CStr) -> Self {
        Self {
            name,
            contract: Contract::Unimplemented,
        }
    }
}

/// Build a symbol name from a NUL-terminated byte literal in const context.
///
/// Used as `symbol_name(concat!(stringify!(Py_IncRef), "\0").as_bytes())`.
#[must_use]
pub const fn symbol_name(bytes: &'static [u8]) -> &'static CStr {
    match CStr::from_bytes_with_nul(bytes) {
        Ok(name) => name,
        Err(_) => panic!("symbol name must be NUL-terminated without interior NUL bytes"),
    }
}

/// One exported API function: its name, cached target and statistics node.
#[derive(Debug)]
pub struct SymbolEntry {
    id: SymbolId,
    decl: SymbolDecl,
    name: &'static str,
    slot: AtomicPtr<c_void>,
    stats: StatsNode,
}

impl SymbolEntry {
    pub(crate) fn new(id: SymbolId, decl: SymbolDecl, prev: Option<SymbolId>) -> Self {
        Self {
            id,
            decl,
            name: decl.name.to_str().unwrap_or("<non-utf8 symbol>"),
            slot: AtomicPtr::new(ptr::null_mut()),
            stats: StatsNode::new(prev),
        }
    }

    #[must_use]
    pub fn id(&self) -> SymbolId {
        self.id
    }

    /// Name passed to the resolver.
    #[must_use]
    pub fn c_name(&self) -> &'static CStr {
        self.decl.name
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn contract(&self) -> Contract {
        self.decl.contract
    }

    #[must_use]
    pub fn is_noreturn(&self) -> bool {
        self.decl.contract == Contract::NoReturn
    }

    /// True when calls never reach a resolved target.
    #[must_use]
    pub fn is_unimplemented(&self) -> bool {
        self.decl.contract == Contract::Unimplemented
    }

    #[must_use]
    pub fn stats(&self) -> &StatsNode {
        &self.stats
    }

    /// The resolved target, if resolution has completed.
    #[must_use]
    pub fn cached_target(&self) -> Option<NonNull<c_void>> {
        let current = self.slot.load(Ordering::Acquire);
        if current == RESOLVING {
            return None;
        }
        NonNull::new(current)
    }

    pub(crate) fn slot(&self) -> &AtomicPtr<c_void> {
        &self.slot
    }

    pub(crate) fn clear(&self) {
        self.slot.store(ptr::null_mut(), Ordering::Release);
        self.stats.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: &CStr = symbol_name(concat!(stringify!(PyObject_Repr), "\0").as_bytes());

    #[test]
    fn const_names_keep_the_identifier() {
        assert_eq!(NAME.to_bytes(), b"PyObject_Repr");
    }

    #[test]
    fn fresh_entry_is_unresolved() {
        let entry = SymbolEntry::new(SymbolId::new(3), SymbolDecl::forward(NAME), None);
        assert_eq!(entry.id().index(), 3);
        assert_eq!(entry.name(), "PyObject_Repr");
        assert!(entry.cached_target().is_none());
        assert!(!entry.is_noreturn());
    }

    #[test]
    fn resolving_sentinel_is_not_a_target() {
        let entry = SymbolEntry::new(SymbolId::new(0), SymbolDecl::noreturn(NAME), None);
        entry.slot().store(RESOLVING, Ordering::Release);
        assert!(entry.cached_target().is_none());
        assert!(entry.is_noreturn());
        entry.clear();
        assert!(entry.slot().load(Ordering::Acquire).is_null());
    }
}
