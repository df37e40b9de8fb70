//! `capishim_*` entry points the host runtime calls to drive the shim.

use std::ffi::{c_char, c_int};
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use capishim_core::log::events;
use capishim_core::{HostResolver, ResolveFn};
use serde_json::json;

use crate::runtime::{registry, try_registry};

static AT_EXIT_REGISTERED: AtomicBool = AtomicBool::new(false);

/// One statistics node as exported by [`capishim_stats_snapshot`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CStatsRecord {
    /// NUL-terminated symbol name with static lifetime.
    pub name: *const c_char,
    pub calls: u64,
    pub elapsed_ns: u64,
}

impl Default for CStatsRecord {
    fn default() -> Self {
        Self {
            name: ptr::null(),
            calls: 0,
            elapsed_ns: 0,
        }
    }
}

/// Install the host lookup callback.
///
/// Returns 0 when installed, 1 when it replaced a previous callback and -1
/// for a null callback. Symbols bound through the previous callback keep
/// their targets.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn capishim_init(resolve: Option<ResolveFn>) -> c_int {
    let Some(resolve) = resolve else {
        return -1;
    };
    let registry = registry();
    // SAFETY: the host promises a lookup callback valid for the process.
    let resolver = unsafe { HostResolver::new(resolve) };
    let replaced = registry.install_resolver(Arc::new(resolver)).is_some();

    if registry.config().stats_at_exit && !AT_EXIT_REGISTERED.swap(true, Ordering::AcqRel) {
        // SAFETY: `dump_at_exit` is a plain extern "C" fn with no arguments.
        if unsafe { libc::atexit(dump_at_exit) } != 0 {
            registry.warn(events::CONFIG, json!({ "error": "atexit registration failed" }));
        }
    }

    c_int::from(replaced)
}

extern "C" fn dump_at_exit() {
    // A shut-down registry has already dumped and reset.
    if let Some(registry) = try_registry() {
        if registry.has_resolver() {
            registry.dump_stats();
        }
    }
}

/// Dump statistics if configured, drop the resolver and unbind every symbol.
///
/// Must not race with forwarded calls.
#[unsafe(no_mangle)]
pub extern "C" fn capishim_shutdown() {
    if let Some(registry) = try_registry() {
        registry.shutdown(registry.config().stats_at_exit);
    }
}

/// Bind every symbol now.
///
/// Returns the number of symbols the host does not provide (each reported
/// as a warning record), or -1 without a resolver. Symbols the shim exports
/// for linking only are not looked up and do not count as missing.
#[unsafe(no_mangle)]
pub extern "C" fn capishim_resolve_all() -> c_int {
    let registry = registry();
    match registry.resolve_all() {
        Ok(report) => {
            for symbol in &report.missing {
                registry.warn(events::RESOLVE, json!({ "missing": symbol }));
            }
            c_int::try_from(report.missing.len()).unwrap_or(c_int::MAX)
        }
        Err(err) => {
            registry.warn(events::RESOLVE, json!({ "error": err.to_string() }));
            -1
        }
    }
}

/// Number of statistics nodes (one per exported symbol).
#[unsafe(no_mangle)]
pub extern "C" fn capishim_stats_count() -> usize {
    registry().len()
}

/// Copy up to `cap` statistics records into `out`, head first.
///
/// Returns the number of records written, or the number available when
/// `out` is null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn capishim_stats_snapshot(out: *mut CStatsRecord, cap: usize) -> usize {
    let registry = registry();
    if out.is_null() {
        return registry.len();
    }
    let mut written = 0;
    for entry in registry.walk_stats().take(cap) {
        let record = CStatsRecord {
            name: entry.c_name().as_ptr(),
            calls: entry.stats().calls(),
            elapsed_ns: entry.stats().elapsed_ns(),
        };
        // SAFETY: caller provides room for `cap` records and `written < cap`.
        unsafe { out.add(written).write(record) };
        written += 1;
    }
    written
}

/// Write a statistics dump to the log sink now.
///
/// The dump is written even with `CAPISHIM_LOG=off`, which only silences
/// records the shim emits on its own.
#[unsafe(no_mangle)]
pub extern "C" fn capishim_stats_dump() {
    registry().dump_stats();
}

/// Name of the symbol at `index` in declaration order, or null.
#[unsafe(no_mangle)]
pub extern "C" fn capishim_symbol_name(index: usize) -> *const c_char {
    registry()
        .entries()
        .get(index)
        .map_or(ptr::null(), |entry| entry.c_name().as_ptr())
}

