//! Tooling around the capishim forwarding layer.
//!
//! This crate provides:
//! - Manifest: the exported symbol table as JSON (names, contracts, signatures)
//! - Check: bind every symbol against a shared library and list the gaps
//! - Report: aggregate statistics dumps from a JSONL log
//! - Log validation: schema-check JSONL records written by the shim

#![forbid(unsafe_code)]

pub mod check;
pub mod error;
pub mod log_check;
pub mod manifest;
pub mod report;

pub use check::{CheckReport, check_library};
pub use error::HarnessError;
pub use log_check::{LogValidationError, validate_log_file, validate_log_line};
pub use manifest::{ManifestEntry, SymbolManifest};
pub use report::{StatsReport, StatsRow};
