//! Error taxonomy for the forwarding layer.

/// Errors surfaced by resolution, configuration and tooling paths.
///
/// Forwarded calls themselves never produce these: whatever the real
/// implementation returns passes through untouched.
#[derive(Debug, thiserror::Error)]
pub enum ShimError {
    /// A trampoline was called before the host installed a resolver.
    #[error("no symbol resolver installed")]
    NoResolver,
    /// The resolver has no implementation for this symbol.
    #[error("host runtime does not provide `{symbol}`")]
    Unresolved { symbol: String },
    /// The symbol is exported only to report that the host lacks it.
    #[error("`{symbol}` is not implemented by the host runtime")]
    NotImplemented { symbol: String },
    /// The resolver called back into the same unresolved symbol.
    #[error("re-entrant resolution of `{symbol}` on the same thread")]
    ReentrantResolution { symbol: String },
    /// Lookup by name for a symbol that is not part of the table.
    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),
    /// A shared library could not be opened for lookup.
    #[error("cannot load library `{path}`: {message}")]
    Library { path: String, message: String },
    /// An environment variable holds an unusable value.
    #[error("invalid value {value:?} for {key}")]
    Config { key: &'static str, value: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ShimError {
    /// Symbol name carried by resolution errors, if any.
    #[must_use]
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::Unresolved { symbol }
            | Self::NotImplemented { symbol }
            | Self::ReentrantResolution { symbol } => Some(symbol),
            Self::UnknownSymbol(name) => Some(name),
            _ => None,
        }
    }
}
