//! # capishim-core
//!
//! Runtime pieces behind the capishim forwarding layer.
//!
//! Every exported C-API symbol is a trampoline that asks the [`Registry`] for
//! its target. The registry owns one [`SymbolEntry`] per symbol: a cached
//! function pointer that is filled on first use through the host's
//! [`Resolver`], plus the statistics node for that symbol.
//!
//! ```text
//! C caller -> trampoline -> Registry::forward -> (miss) Resolver -> real impl
//! ```
//!
//! Instrumentation is optional and never changes forwarding results:
//! - statistics: per-symbol call count and cumulative time, dumped every
//!   `dump_every` calls;
//! - call log: structured JSONL records for every call and return.

pub mod config;
pub mod error;
pub mod log;
pub mod registry;
pub mod resolver;
pub mod stats;
pub mod symbol;

mod util;

pub use config::{LogMode, ShimConfig};
pub use error::ShimError;
pub use log::{ArgRepr, LogEntry, LogLevel, LogSink, SharedBuffer};
pub use registry::{AbortHook, AbortReason, BindReport, Registry, StatsIter};
pub use resolver::{HostResolver, ResolveFn, Resolver, TableResolver};
pub use stats::{StatsCollector, StatsNode, StatsSnapshot, SymbolStats};
pub use symbol::{Contract, SymbolDecl, SymbolEntry, SymbolId, symbol_name};
