//! The symbol registry: resolution cache, dispatcher and instrumentation.
//!
//! A [`Registry`] owns one [`SymbolEntry`] per exported symbol. Each entry's
//! slot moves through three states:
//!
//! ```text
//! null --CAS--> RESOLVING --resolver ok--> target (until reset)
//!                   |
//!                   +--resolver failed / panicked--> null
//! ```
//!
//! Only the thread that wins the CAS calls the resolver. Other threads wait
//! for the winner to publish; the winning thread itself gets
//! [`ShimError::ReentrantResolution`] if its resolver calls back into the
//! same symbol.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::mem;
use std::ptr::{self, NonNull};
use std::sync::Arc;
use std::sync::atomic::{AtomicPtr, AtomicU8, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde_json::json;

use crate::config::{LogMode, ShimConfig};
use crate::error::ShimError;
use crate::log::{ArgRepr, LogEntry, LogLevel, LogSink, events};
use crate::resolver::Resolver;
use crate::stats::{StatsCollector, StatsSnapshot, SymbolStats};
use crate::symbol::{RESOLVING, SymbolDecl, SymbolEntry, SymbolId};

/// Called with the symbol name right before the process aborts.
///
/// The default hook does nothing; the fatal record has already been written.
/// A hook that unwinds prevents the abort, which is only sound for callers
/// that can catch the unwind (Rust tests driving the registry directly).
pub type AbortHook = fn(symbol: &str, reason: &AbortReason);

fn default_abort_hook(_symbol: &str, _reason: &AbortReason) {}

/// Why a trampoline is terminating the process.
#[derive(Debug)]
pub enum AbortReason {
    /// A function documented as never returning returned.
    ReturnedFromNoreturn,
    /// The target could not be bound.
    Unresolved(ShimError),
    /// The symbol is declared unimplemented and was called.
    NotImplemented,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReturnedFromNoreturn => f.write_str("no-return function returned to its caller"),
            Self::Unresolved(err) => write!(f, "{err}"),
            Self::NotImplemented => f.write_str("function not implemented by the host runtime"),
        }
    }
}

/// Outcome of [`Registry::resolve_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    /// Symbols with a cached target after the pass.
    pub bound: usize,
    /// Symbols the resolver does not provide, in declaration order.
    pub missing: Vec<&'static str>,
    /// Symbols declared unimplemented; never passed to the resolver.
    pub unimplemented: Vec<&'static str>,
}

impl BindReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

thread_local! {
    /// Symbols this thread is currently resolving, keyed by registry address.
    static IN_FLIGHT: RefCell<Vec<(usize, SymbolId)>> = const { RefCell::new(Vec::new()) };
}

struct InFlight {
    key: (usize, SymbolId),
}

impl InFlight {
    /// Mark `key` as being resolved on this thread; `None` if it already is.
    fn enter(key: (usize, SymbolId)) -> Option<Self> {
        IN_FLIGHT.with_borrow_mut(|stack| {
            if stack.contains(&key) {
                return None;
            }
            stack.push(key);
            Some(Self { key })
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        IN_FLIGHT.with_borrow_mut(|stack| {
            if let Some(pos) = stack.iter().rposition(|k| *k == self.key) {
                stack.remove(pos);
            }
        });
    }
}

/// Holds a slot in the RESOLVING state; returns it to null unless published.
struct Claim<'a> {
    slot: &'a AtomicPtr<c_void>,
    published: bool,
}

impl Claim<'_> {
    fn publish(mut self, target: NonNull<c_void>) {
        self.slot.store(target.as_ptr(), Ordering::Release);
        self.published = true;
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.published {
            self.slot.store(ptr::null_mut(), Ordering::Release);
        }
    }
}

/// Process-wide table of exported symbols and their instrumentation.
pub struct Registry {
    entries: Box<[SymbolEntry]>,
    by_name: HashMap<&'static str, SymbolId>,
    resolver: RwLock<Option<Arc<dyn Resolver>>>,
    stats: StatsCollector,
    log_mode: AtomicU8,
    sink: Mutex<LogSink>,
    abort_hook: RwLock<AbortHook>,
    config: ShimConfig,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("symbols", &self.entries.len())
            .field("has_resolver", &self.has_resolver())
            .field("stats", &self.stats)
            .field("log_mode", &self.log_mode())
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Build a registry for `decls`, logging to the sink `config` names.
    ///
    /// If the configured log file cannot be opened the registry falls back
    /// to stderr and records a warning there.
    #[must_use]
    pub fn new(decls: &[SymbolDecl], config: &ShimConfig) -> Self {
        let (sink, open_error) = match &config.log_file {
            Some(path) => match LogSink::to_file(path) {
                Ok(sink) => (sink, None),
                Err(err) => (LogSink::stderr(), Some((path.display().to_string(), err))),
            },
            None => (LogSink::stderr(), None),
        };
        let registry = Self::with_sink(decls, config, sink);
        if let Some((path, err)) = open_error {
            registry.warn(
                events::CONFIG,
                json!({ "log_file": path, "error": err.to_string() }),
            );
        }
        registry
    }

    /// Build a registry writing to an explicit sink.
    #[must_use]
    pub fn with_sink(decls: &[SymbolDecl], config: &ShimConfig, sink: LogSink) -> Self {
        let mut by_name = HashMap::with_capacity(decls.len());
        let entries: Box<[SymbolEntry]> = decls
            .iter()
            .enumerate()
            .map(|(index, decl)| {
                let id = SymbolId::new(index as u32);
                let prev = index.checked_sub(1).map(|p| SymbolId::new(p as u32));
                let entry = SymbolEntry::new(id, *decl, prev);
                by_name.insert(entry.name(), id);
                entry
            })
            .collect();

        Self {
            entries,
            by_name,
            resolver: RwLock::new(None),
            stats: StatsCollector::new(config.stats, config.dump_every),
            log_mode: AtomicU8::new(config.log.to_u8()),
            sink: Mutex::new(sink),
            abort_hook: RwLock::new(default_abort_hook),
            config: config.clone(),
        }
    }

    /// Configuration the registry was built with.
    #[must_use]
    pub fn config(&self) -> &ShimConfig {
        &self.config
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in declaration order.
    #[must_use]
    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    /// # Panics
    ///
    /// Panics if `id` was not issued for this registry's declarations.
    #[must_use]
    pub fn entry(&self, id: SymbolId) -> &SymbolEntry {
        &self.entries[id.index()]
    }

    pub fn lookup(&self, name: &str) -> Result<SymbolId, ShimError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ShimError::UnknownSymbol(name.to_string()))
    }

    // -----------------------------------------------------------------------
    // Resolver lifecycle
    // -----------------------------------------------------------------------

    /// Install the host resolver, returning the one it replaces.
    ///
    /// Slots that are already bound keep their target.
    pub fn install_resolver(&self, resolver: Arc<dyn Resolver>) -> Option<Arc<dyn Resolver>> {
        self.resolver.write().replace(resolver)
    }

    pub fn take_resolver(&self) -> Option<Arc<dyn Resolver>> {
        self.resolver.write().take()
    }

    #[must_use]
    pub fn has_resolver(&self) -> bool {
        self.resolver.read().is_some()
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Return the cached target of `id`, resolving it on first use.
    #[inline]
    pub fn ensure_resolved(&self, id: SymbolId) -> Result<NonNull<c_void>, ShimError> {
        let entry = self.entry(id);
        let current = entry.slot().load(Ordering::Acquire);
        if current != RESOLVING {
            if let Some(target) = NonNull::new(current) {
                return Ok(target);
            }
        }
        self.resolve_slow(entry)
    }

    #[cold]
    #[inline(never)]
    fn resolve_slow(&self, entry: &SymbolEntry) -> Result<NonNull<c_void>, ShimError> {
        if entry.is_unimplemented() {
            return Err(ShimError::NotImplemented {
                symbol: entry.name().to_string(),
            });
        }
        let Some(_in_flight) = InFlight::enter((ptr::from_ref(self).addr(), entry.id())) else {
            return Err(ShimError::ReentrantResolution {
                symbol: entry.name().to_string(),
            });
        };

        let slot = entry.slot();
        let mut spins = 0u32;
        loop {
            match slot.compare_exchange(
                ptr::null_mut(),
                RESOLVING,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return self.run_resolver(
                        entry,
                        Claim {
                            slot,
                            published: false,
                        },
                    );
                }
                Err(actual) if actual == RESOLVING => {
                    // Another thread is binding this symbol.
                    if spins < 64 {
                        std::hint::spin_loop();
                        spins += 1;
                    } else {
                        std::thread::yield_now();
                    }
                }
                Err(actual) => {
                    if let Some(target) = NonNull::new(actual) {
                        return Ok(target);
                    }
                }
            }
        }
    }

    fn run_resolver(
        &self,
        entry: &SymbolEntry,
        claim: Claim<'_>,
    ) -> Result<NonNull<c_void>, ShimError> {
        // Clone out of the lock: the resolver may install another resolver.
        let resolver = self.resolver.read().clone().ok_or(ShimError::NoResolver)?;
        let target = resolver
            .resolve(entry.c_name())
            .ok_or_else(|| ShimError::Unresolved {
                symbol: entry.name().to_string(),
            })?;
        claim.publish(target);

        if self.log_mode().logs_calls() {
            self.emit(
                LogEntry::new(LogLevel::Debug, events::RESOLVE)
                    .with_symbol(entry.name())
                    .with_result(crate::log::describe_addr(target.as_ptr().addr())),
            );
        }
        Ok(target)
    }

    /// Bind every symbol now and report the ones the resolver lacks.
    ///
    /// Unimplemented symbols are listed separately and never looked up.
    /// Fails only when no resolver is installed or a resolution re-enters.
    pub fn resolve_all(&self) -> Result<BindReport, ShimError> {
        let mut report = BindReport::default();
        for entry in self.entries.iter() {
            match self.ensure_resolved(entry.id()) {
                Ok(_) => report.bound += 1,
                Err(ShimError::Unresolved { .. }) => report.missing.push(entry.name()),
                Err(ShimError::NotImplemented { .. }) => report.unimplemented.push(entry.name()),
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Forward one call to the target of `id`.
    ///
    /// Logs the call, binds the target (aborting if that fails), counts and
    /// times the call, runs `invoke` with the target reinterpreted as `F` and
    /// logs the result. `R` is returned untouched.
    ///
    /// # Safety
    ///
    /// `F` must be the exact function pointer type of the symbol `id`, and
    /// `args` must satisfy [`ArgRepr::repr`] when call logging is on.
    #[inline]
    pub unsafe fn forward<F: Copy, R: ArgRepr>(
        &self,
        id: SymbolId,
        args: &[&dyn ArgRepr],
        invoke: impl FnOnce(F) -> R,
    ) -> R {
        const { assert!(mem::size_of::<F>() == mem::size_of::<*mut c_void>()) };

        let entry = self.entry(id);
        let log_calls = self.log_mode().logs_calls();
        if log_calls {
            let args = args
                .iter()
                // SAFETY: forwarded from this function's contract.
                .map(|arg| unsafe { arg.repr() }.unwrap_or_default())
                .collect();
            self.emit(
                LogEntry::new(LogLevel::Trace, events::CALL)
                    .with_symbol(entry.name())
                    .with_args(args),
            );
        }

        let target = match self.ensure_resolved(id) {
            Ok(target) => target,
            Err(err) => self.abort(id, AbortReason::Unresolved(err)),
        };

        let started = self.stats_before(entry);
        // SAFETY: `F` is pointer-sized (checked above) and is the symbol's
        // function pointer type per this function's contract.
        let result = invoke(unsafe { mem::transmute_copy::<NonNull<c_void>, F>(&target) });
        self.stats.after(entry.stats(), started);

        if log_calls {
            // SAFETY: forwarded from this function's contract.
            if let Some(text) = unsafe { result.repr() } {
                self.emit(
                    LogEntry::new(LogLevel::Trace, events::RETURN)
                        .with_symbol(entry.name())
                        .with_result(text),
                );
            }
        }
        result
    }

    /// Forward a call that must not return, aborting if it does.
    ///
    /// # Safety
    ///
    /// Same as [`Registry::forward`].
    pub unsafe fn forward_noreturn<F: Copy>(
        &self,
        id: SymbolId,
        args: &[&dyn ArgRepr],
        invoke: impl FnOnce(F),
    ) -> ! {
        // SAFETY: forwarded from this function's contract.
        unsafe { self.forward(id, args, invoke) };
        self.abort(id, AbortReason::ReturnedFromNoreturn)
    }

    /// Write a fatal record for `id`, run the abort hook and abort.
    #[cold]
    #[inline(never)]
    pub fn abort(&self, id: SymbolId, reason: AbortReason) -> ! {
        self.terminate(id, &reason);
        std::process::abort()
    }

    /// Entry point of a symbol declared unimplemented.
    ///
    /// Writes a fatal record naming the symbol, runs the abort hook and exits
    /// with status -1. The resolver is never consulted.
    #[cold]
    #[inline(never)]
    pub fn unimplemented(&self, id: SymbolId) -> ! {
        self.terminate(id, &AbortReason::NotImplemented);
        std::process::exit(-1)
    }

    fn terminate(&self, id: SymbolId, reason: &AbortReason) {
        let name = self.entry(id).name();
        if self.log_mode().logs_fatal() {
            self.emit(
                LogEntry::new(LogLevel::Fatal, events::ABORT)
                    .with_symbol(name)
                    .with_details(json!({ "reason": reason.to_string() })),
            );
            self.flush_log();
        }
        let hook = *self.abort_hook.read();
        hook(name, reason);
    }

    /// Replace the abort hook, returning the previous one.
    pub fn set_abort_hook(&self, hook: AbortHook) -> AbortHook {
        mem::replace(&mut *self.abort_hook.write(), hook)
    }

    // -----------------------------------------------------------------------
    // Statistics
    // -----------------------------------------------------------------------

    fn stats_before(&self, entry: &SymbolEntry) -> Option<Instant> {
        let dump_due = self.stats.before(entry.stats())?;
        if dump_due && self.log_mode().logs_fatal() {
            self.dump_stats();
        }
        Some(Instant::now())
    }

    #[must_use]
    pub fn stats(&self) -> &StatsCollector {
        &self.stats
    }

    pub fn set_stats_enabled(&self, enabled: bool) {
        self.stats.set_enabled(enabled);
    }

    /// Walk the statistics list from its head (the last-declared symbol).
    pub fn walk_stats(&self) -> StatsIter<'_> {
        StatsIter {
            registry: self,
            next: self.entries.last().map(SymbolEntry::id),
        }
    }

    #[must_use]
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_calls: self.stats.total_calls(),
            dump_every: self.stats.dump_every(),
            symbols: self
                .walk_stats()
                .map(|entry| SymbolStats {
                    symbol: entry.name().to_string(),
                    calls: entry.stats().calls(),
                    elapsed_ns: entry.stats().elapsed_ns(),
                })
                .collect(),
        }
    }

    /// Write one `stats` record per symbol, head first, then a summary.
    ///
    /// An explicit dump is written in every log mode; only the periodic dump
    /// is silenced by [`LogMode::Off`].
    pub fn dump_stats(&self) {
        let mut sink = self.sink.lock();
        for entry in self.walk_stats() {
            let node = entry.stats();
            let _ = sink.emit(
                LogEntry::new(LogLevel::Info, events::STATS)
                    .with_symbol(entry.name())
                    .with_counters(node.calls(), node.elapsed_ns()),
            );
        }
        let _ = sink.emit(
            LogEntry::new(LogLevel::Info, events::STATS_DUMP)
                .with_total_calls(self.stats.total_calls())
                .with_details(json!({
                    "symbols": self.entries.len(),
                    "dump_every": self.stats.dump_every(),
                })),
        );
        let _ = sink.flush();
    }

    // -----------------------------------------------------------------------
    // Logging
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn log_mode(&self) -> LogMode {
        LogMode::from_u8(self.log_mode.load(Ordering::Relaxed))
    }

    pub fn set_log_mode(&self, mode: LogMode) {
        self.log_mode.store(mode.to_u8(), Ordering::Relaxed);
    }

    /// Swap the sink, returning the previous one.
    pub fn replace_sink(&self, sink: LogSink) -> LogSink {
        let mut old = mem::replace(&mut *self.sink.lock(), sink);
        let _ = old.flush();
        old
    }

    /// Write a record regardless of the log mode. Write errors are dropped.
    pub fn emit(&self, entry: LogEntry) {
        let _ = self.sink.lock().emit(entry);
    }

    /// Write a warning record unless logging is off.
    pub fn warn(&self, event: &str, details: serde_json::Value) {
        if self.log_mode().logs_fatal() {
            self.emit(LogEntry::new(LogLevel::Warn, event).with_details(details));
        }
    }

    pub fn flush_log(&self) {
        let _ = self.sink.lock().flush();
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Unbind every slot and zero all counters.
    ///
    /// Must not race with calls in flight.
    pub fn reset(&self) {
        for entry in self.entries.iter() {
            entry.clear();
        }
        self.stats.reset();
    }

    /// Optionally dump statistics, drop the resolver and reset.
    pub fn shutdown(&self, dump: bool) {
        if dump {
            self.dump_stats();
        }
        self.take_resolver();
        self.reset();
        self.flush_log();
    }
}

/// Iterator over symbol entries along the statistics links.
#[derive(Debug)]
pub struct StatsIter<'a> {
    registry: &'a Registry,
    next: Option<SymbolId>,
}

impl<'a> Iterator for StatsIter<'a> {
    type Item = &'a SymbolEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.registry.entries.get(self.next?.index())?;
        self.next = entry.stats().prev();
        Some(entry)
    }
}
