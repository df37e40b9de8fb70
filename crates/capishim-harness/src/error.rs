//! Harness error type.

use std::path::PathBuf;

use capishim_core::ShimError;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("failed reading '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown output format '{0}' (expected 'json' or 'table')")]
    Format(String),
    #[error(transparent)]
    Shim(#[from] ShimError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
