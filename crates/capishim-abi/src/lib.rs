#![cfg_attr(feature = "c-variadic", feature(c_variadic))]
// Trampolines take raw pointers straight from C callers and hand them on
// untouched; their contract is the contract of the function they shadow.
#![allow(clippy::missing_safety_doc)]
//! # capishim-abi
//!
//! Exported C-API surface of the shim.
//!
//! This crate produces a `cdylib` (`libcapishim_abi.so`) whose exports carry the
//! names and signatures of the Python C API. Each export is a trampoline that
//! binds to the host's implementation on first use and forwards every call
//! through the cached pointer.
//!
//! # Architecture
//!
//! ```text
//! C extension -> trampoline (this crate) -> Registry (capishim-core) -> host impl
//!                                              |
//!                                              +-- first use: capishim_init callback
//! ```
//!
//! The host installs its lookup callback with `capishim_init` before any
//! extension code runs. Variadic APIs are exported as their `va_list`
//! counterparts; the `...` forms need the `c-variadic` feature.

#[macro_use]
mod macros;

pub mod control;
#[cfg(unix)]
pub mod loader;
pub mod runtime;
pub mod symbols;
pub mod types;
#[cfg(feature = "c-variadic")]
pub mod variadic;

pub use control::CStatsRecord;
#[cfg(unix)]
pub use loader::LibraryResolver;
pub use runtime::registry;
pub use symbols::{SYMBOLS, Symbol, VARIADIC_PAIRS};
