//! Runtime configuration.
//!
//! Read once from the environment when the global registry is built:
//! - `CAPISHIM_STATS`: `1|on|true|yes` or `0|off|false|no` (default off).
//!   Only effective when the ABI crate is built with its `stats` feature.
//!   With no variables set a forwarded call does nothing but forward.
//! - `CAPISHIM_DUMP_EVERY`: dump statistics every N instrumented calls
//!   (default 100000, `0` disables the periodic dump).
//! - `CAPISHIM_STATS_AT_EXIT`: dump statistics on shutdown (default off).
//! - `CAPISHIM_LOG`: `off`, `fatal` (default) or `calls`. `calls` requires
//!   the ABI crate's `call-log` feature.
//! - `CAPISHIM_LOG_FILE`: append JSONL records to this file instead of stderr.

use std::path::PathBuf;

use crate::error::ShimError;

/// Default number of instrumented calls between two statistics dumps.
pub const DEFAULT_DUMP_EVERY: u64 = 100_000;

pub const ENV_STATS: &str = "CAPISHIM_STATS";
pub const ENV_DUMP_EVERY: &str = "CAPISHIM_DUMP_EVERY";
pub const ENV_STATS_AT_EXIT: &str = "CAPISHIM_STATS_AT_EXIT";
pub const ENV_LOG: &str = "CAPISHIM_LOG";
pub const ENV_LOG_FILE: &str = "CAPISHIM_LOG_FILE";

/// Which records reach the log sink.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogMode {
    /// Nothing is written, not even fatal diagnostics. Explicitly requested
    /// statistics dumps are the one exception.
    Off,
    /// Fatal diagnostics, warnings and statistics dumps.
    #[default]
    Fatal,
    /// Everything above plus one record per call and per return.
    Calls,
}

impl LogMode {
    /// Parse from string (case-insensitive). Unknown values map to the default.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" | "0" => Self::Off,
            "calls" | "verbose" | "trace" | "all" => Self::Calls,
            _ => Self::Fatal,
        }
    }

    /// Returns true if per-call records are written.
    #[must_use]
    pub const fn logs_calls(self) -> bool {
        matches!(self, Self::Calls)
    }

    /// Returns true if fatal/warn/statistics records are written.
    #[must_use]
    pub const fn logs_fatal(self) -> bool {
        !matches!(self, Self::Off)
    }

    pub(crate) const fn to_u8(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Fatal => 1,
            Self::Calls => 2,
        }
    }

    pub(crate) const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Off,
            2 => Self::Calls,
            _ => Self::Fatal,
        }
    }
}

/// Parse a boolean switch. Returns `None` for unrecognised input.
#[must_use]
pub fn parse_bool_loose(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" | "enabled" => Some(true),
        "0" | "off" | "false" | "no" | "disabled" => Some(false),
        _ => None,
    }
}

/// Instrumentation settings for a [`crate::Registry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShimConfig {
    /// Count calls and accumulate time per symbol.
    pub stats: bool,
    /// Dump statistics every N instrumented calls; 0 disables.
    pub dump_every: u64,
    /// Dump statistics when the registry shuts down.
    pub stats_at_exit: bool,
    pub log: LogMode,
    /// Sink file; `None` writes to stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            stats: false,
            dump_every: DEFAULT_DUMP_EVERY,
            stats_at_exit: false,
            log: LogMode::default(),
            log_file: None,
        }
    }
}

impl ShimConfig {
    /// Configuration with every instrumentation switched off.
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            stats: false,
            dump_every: 0,
            stats_at_exit: false,
            log: LogMode::Off,
            log_file: None,
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ShimError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ShimError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_STATS) {
            config.stats = parse_bool_loose(&raw).ok_or(ShimError::Config {
                key: ENV_STATS,
                value: raw,
            })?;
        }
        if let Some(raw) = lookup(ENV_DUMP_EVERY) {
            config.dump_every = raw.trim().parse().map_err(|_| ShimError::Config {
                key: ENV_DUMP_EVERY,
                value: raw,
            })?;
        }
        if let Some(raw) = lookup(ENV_STATS_AT_EXIT) {
            config.stats_at_exit = parse_bool_loose(&raw).ok_or(ShimError::Config {
                key: ENV_STATS_AT_EXIT,
                value: raw,
            })?;
        }
        if let Some(raw) = lookup(ENV_LOG) {
            config.log = LogMode::from_str_loose(&raw);
        }
        config.log_file = lookup(ENV_LOG_FILE)
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_log_modes() {
        assert_eq!(LogMode::from_str_loose("off"), LogMode::Off);
        assert_eq!(LogMode::from_str_loose("NONE"), LogMode::Off);
        assert_eq!(LogMode::from_str_loose("calls"), LogMode::Calls);
        assert_eq!(LogMode::from_str_loose("Verbose"), LogMode::Calls);
        assert_eq!(LogMode::from_str_loose("fatal"), LogMode::Fatal);
        assert_eq!(LogMode::from_str_loose("bogus"), LogMode::Fatal);
    }

    #[test]
    fn log_mode_round_trips_through_atomic_encoding() {
        for mode in [LogMode::Off, LogMode::Fatal, LogMode::Calls] {
            assert_eq!(LogMode::from_u8(mode.to_u8()), mode);
        }
        assert_eq!(LogMode::from_u8(200), LogMode::Fatal);
    }

    #[test]
    fn only_calls_mode_logs_calls() {
        assert!(!LogMode::Off.logs_calls());
        assert!(!LogMode::Fatal.logs_calls());
        assert!(LogMode::Calls.logs_calls());
        assert!(!LogMode::Off.logs_fatal());
        assert!(LogMode::Fatal.logs_fatal());
        assert!(LogMode::Calls.logs_fatal());
    }

    #[test]
    fn bool_switches() {
        assert_eq!(parse_bool_loose("1"), Some(true));
        assert_eq!(parse_bool_loose(" ON "), Some(true));
        assert_eq!(parse_bool_loose("false"), Some(false));
        assert_eq!(parse_bool_loose("maybe"), None);
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = ShimConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ShimConfig::default());
        assert!(!config.stats);
        assert!(!config.stats_at_exit);
        assert_eq!(config.dump_every, DEFAULT_DUMP_EVERY);
        assert_eq!(config.log, LogMode::Fatal);
    }

    #[test]
    fn statistics_are_opt_in() {
        let config = ShimConfig::from_lookup(lookup_from(&[(ENV_STATS, "on")])).unwrap();
        assert!(config.stats);
        assert_eq!(config.dump_every, DEFAULT_DUMP_EVERY);
    }

    #[test]
    fn environment_overrides() {
        let config = ShimConfig::from_lookup(lookup_from(&[
            (ENV_STATS, "off"),
            (ENV_DUMP_EVERY, "250"),
            (ENV_STATS_AT_EXIT, "yes"),
            (ENV_LOG, "calls"),
            (ENV_LOG_FILE, "/tmp/capishim.jsonl"),
        ]))
        .unwrap();
        assert!(!config.stats);
        assert_eq!(config.dump_every, 250);
        assert!(config.stats_at_exit);
        assert_eq!(config.log, LogMode::Calls);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/capishim.jsonl")));
    }

    #[test]
    fn blank_log_file_means_stderr() {
        let config = ShimConfig::from_lookup(lookup_from(&[(ENV_LOG_FILE, "  ")])).unwrap();
        assert_eq!(config.log_file, None);
    }

    #[test]
    fn malformed_values_are_reported() {
        let err = ShimConfig::from_lookup(lookup_from(&[(ENV_DUMP_EVERY, "lots")])).unwrap_err();
        assert!(matches!(err, ShimError::Config { key: ENV_DUMP_EVERY, .. }));

        let err = ShimConfig::from_lookup(lookup_from(&[(ENV_STATS, "sometimes")])).unwrap_err();
        assert!(matches!(err, ShimError::Config { key: ENV_STATS, .. }));
    }
}
