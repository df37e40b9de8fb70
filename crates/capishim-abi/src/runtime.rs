//! The process-wide registry behind every trampoline.
//!
//! Built on first use from the environment (see `capishim_core::config`),
//! with instrumentation the crate was compiled without forced off.

use std::sync::OnceLock;

use capishim_core::log::events;
use capishim_core::{LogMode, Registry, ShimConfig};
use serde_json::json;

use crate::symbols::SYMBOLS;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The global registry, created on first call.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(build_registry)
}

/// The registry if any trampoline or control call has created it.
pub(crate) fn try_registry() -> Option<&'static Registry> {
    REGISTRY.get()
}

fn build_registry() -> Registry {
    let (config, config_error) = match ShimConfig::from_env() {
        Ok(config) => (config, None),
        Err(err) => (ShimConfig::default(), Some(err)),
    };
    let registry = Registry::new(SYMBOLS, &restrict_to_features(config));
    if let Some(err) = config_error {
        registry.warn(
            events::CONFIG,
            json!({ "error": err.to_string(), "fallback": "defaults" }),
        );
    }
    registry
}

/// Switch off what this build cannot do.
#[must_use]
pub fn restrict_to_features(mut config: ShimConfig) -> ShimConfig {
    if !cfg!(feature = "stats") {
        config.stats = false;
        config.stats_at_exit = false;
    }
    if !cfg!(feature = "call-log") && config.log == LogMode::Calls {
        config.log = LogMode::Fatal;
    }
    config
}
