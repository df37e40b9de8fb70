//! Bind the exported symbol table against a real shared library.

use std::path::Path;
use std::sync::Arc;

use capishim_abi::{LibraryResolver, SYMBOLS};
use capishim_core::{LogSink, Registry, ShimConfig};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::HarnessError;

/// Outcome of binding every symbol against one library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub library: String,
    /// Content hash of the library file, when `library` names a file on disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub prefix: Option<String>,
    pub total: usize,
    pub bound: usize,
    pub missing: Vec<String>,
    /// Exported for linking only; never looked up in the library.
    #[serde(default)]
    pub unimplemented: usize,
}

impl CheckReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Open `library`, resolve every exported symbol through it and report the
/// ones it lacks.
///
/// Resolution runs on a private registry, so the process-wide one used by
/// the trampolines is left untouched.
pub fn check_library(library: &Path, prefix: Option<&str>) -> Result<CheckReport, HarnessError> {
    let mut resolver = LibraryResolver::open(library)?;
    if let Some(prefix) = prefix {
        resolver = resolver.with_prefix(prefix);
    }

    let registry = Registry::with_sink(SYMBOLS, &ShimConfig::quiet(), LogSink::discard());
    registry.install_resolver(Arc::new(resolver));
    let report = registry.resolve_all()?;

    let sha256 = if library.is_file() {
        let bytes = std::fs::read(library).map_err(|source| HarnessError::Read {
            path: library.to_path_buf(),
            source,
        })?;
        Some(sha256_hex(&bytes))
    } else {
        None
    };

    Ok(CheckReport {
        library: library.display().to_string(),
        sha256,
        prefix: prefix.map(str::to_string),
        total: registry.len(),
        bound: report.bound,
        missing: report.missing.iter().map(|name| (*name).to_string()).collect(),
        unimplemented: report.unimplemented.len(),
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex_lower(&Sha256::digest(bytes))
}

fn hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hex_is_lowercase_and_padded() {
        assert_eq!(hex_lower(&[0x00, 0x0f, 0xab]), "000fab");
    }

    #[test]
    fn missing_library_is_an_error() {
        let err = check_library(Path::new("/nonexistent/libpython-missing.so"), None).unwrap_err();
        assert!(matches!(err, HarnessError::Shim(_)), "{err}");
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn libc_provides_none_of_the_api() {
        let report = check_library(Path::new("libc.so.6"), None).unwrap();
        assert_eq!(report.total, SYMBOLS.len());
        assert_eq!(
            report.bound + report.missing.len() + report.unimplemented,
            report.total
        );
        assert!(report.unimplemented > 0);
        assert!(!report.missing.iter().any(|name| name == "PyCell_New"));
        assert!(report.missing.iter().any(|name| name == "PyList_New"));
        assert!(report.sha256.is_none());
        assert!(!report.is_complete());
    }
}
