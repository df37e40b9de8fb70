//! Per-symbol call statistics.
//!
//! Each [`crate::SymbolEntry`] carries a [`StatsNode`] linked to the node of
//! the previously declared symbol, so the list head is the last-declared
//! symbol and a walk visits symbols in reverse declaration order. A global
//! counter drives the periodic dump.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::symbol::SymbolId;

/// Call count and cumulative time for one symbol.
#[derive(Debug)]
pub struct StatsNode {
    prev: Option<SymbolId>,
    calls: AtomicU64,
    elapsed_ns: AtomicU64,
}

impl StatsNode {
    pub(crate) const fn new(prev: Option<SymbolId>) -> Self {
        Self {
            prev,
            calls: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
        }
    }

    /// Link to the node declared before this one.
    #[must_use]
    pub fn prev(&self) -> Option<SymbolId> {
        self.prev
    }

    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn elapsed_ns(&self) -> u64 {
        self.elapsed_ns.load(Ordering::Relaxed)
    }

    fn add_elapsed(&self, ns: u64) {
        // fetch_add wraps; saturate instead so the total stays monotonic.
        let _ = self
            .elapsed_ns
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |total| {
                Some(total.saturating_add(ns))
            });
    }

    pub(crate) fn reset(&self) {
        self.calls.store(0, Ordering::Relaxed);
        self.elapsed_ns.store(0, Ordering::Relaxed);
    }
}

/// Global switches and the call counter that triggers dumps.
#[derive(Debug)]
pub struct StatsCollector {
    enabled: AtomicBool,
    total_calls: AtomicU64,
    dump_every: AtomicU64,
}

impl StatsCollector {
    #[must_use]
    pub const fn new(enabled: bool, dump_every: u64) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            total_calls: AtomicU64::new(0),
            dump_every: AtomicU64::new(dump_every),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    #[must_use]
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dump_every(&self) -> u64 {
        self.dump_every.load(Ordering::Relaxed)
    }

    pub fn set_dump_every(&self, every: u64) {
        self.dump_every.store(every, Ordering::Relaxed);
    }

    /// Count one call. Returns `None` when statistics are off, otherwise
    /// whether this call crossed a dump boundary.
    pub(crate) fn before(&self, node: &StatsNode) -> Option<bool> {
        if !self.is_enabled() {
            return None;
        }
        node.calls.fetch_add(1, Ordering::Relaxed);
        let total = self.total_calls.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let every = self.dump_every();
        Some(every != 0 && total % every == 0)
    }

    /// Add the time elapsed since `started` to the node.
    pub(crate) fn after(&self, node: &StatsNode, started: Option<Instant>) {
        if let Some(started) = started {
            let ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
            node.add_elapsed(ns);
        }
    }

    pub(crate) fn reset(&self) {
        self.total_calls.store(0, Ordering::Relaxed);
    }
}

/// Serializable view of one statistics node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolStats {
    pub symbol: String,
    pub calls: u64,
    pub elapsed_ns: u64,
}

/// Serializable view of the whole list, head first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_calls: u64,
    pub dump_every: u64,
    pub symbols: Vec<SymbolStats>,
}

impl StatsSnapshot {
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<&SymbolStats> {
        self.symbols.iter().find(|s| s.symbol == symbol)
    }

    /// Symbols that were called at least once.
    pub fn called(&self) -> impl Iterator<Item = &SymbolStats> {
        self.symbols.iter().filter(|s| s.calls > 0)
    }
}
