//! Aggregate statistics dumps from a shim log into a per-symbol table.
//!
//! Dumps are cumulative, so the latest `stats` record for a symbol carries
//! its totals. Lines that are not statistics records are ignored.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use capishim_core::LogEntry;
use capishim_core::log::events;
use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRow {
    pub symbol: String,
    pub calls: u64,
    pub elapsed_ns: u64,
    pub mean_ns: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsReport {
    /// Number of `stats_dump` summaries seen.
    pub dumps: usize,
    pub total_calls: u64,
    pub total_elapsed_ns: u64,
    /// Sorted by call count, busiest first; ties by name.
    pub rows: Vec<StatsRow>,
}

impl StatsReport {
    /// Build a report from JSONL text. With `include_idle`, symbols that were
    /// never called are kept.
    #[must_use]
    pub fn from_jsonl(content: &str, include_idle: bool) -> Self {
        let mut latest: BTreeMap<String, (u64, u64)> = BTreeMap::new();
        let mut dumps = 0;

        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Ok(entry) = serde_json::from_str::<LogEntry>(line) else {
                continue;
            };
            match entry.event.as_str() {
                events::STATS => {
                    if let Some(symbol) = entry.symbol {
                        latest.insert(
                            symbol,
                            (entry.calls.unwrap_or(0), entry.elapsed_ns.unwrap_or(0)),
                        );
                    }
                }
                events::STATS_DUMP => dumps += 1,
                _ => {}
            }
        }

        let mut rows: Vec<StatsRow> = latest
            .into_iter()
            .filter(|(_, (calls, _))| include_idle || *calls > 0)
            .map(|(symbol, (calls, elapsed_ns))| StatsRow {
                symbol,
                calls,
                elapsed_ns,
                mean_ns: elapsed_ns.checked_div(calls).unwrap_or(0),
            })
            .collect();
        rows.sort_by(|a, b| b.calls.cmp(&a.calls).then_with(|| a.symbol.cmp(&b.symbol)));

        Self {
            dumps,
            total_calls: rows.iter().map(|r| r.calls).sum(),
            total_elapsed_ns: rows.iter().map(|r| r.elapsed_ns).sum(),
            rows,
        }
    }

    pub fn from_file(path: &Path, include_idle: bool) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path).map_err(|source| HarnessError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_jsonl(&content, include_idle))
    }

    /// Render as `json` or `table`.
    pub fn render(&self, format: &str) -> Result<String, HarnessError> {
        match format {
            "json" => Ok(serde_json::to_string_pretty(self)?),
            "table" => Ok(self.to_table()),
            other => Err(HarnessError::Format(other.to_string())),
        }
    }

    #[must_use]
    pub fn to_table(&self) -> String {
        let width = self
            .rows
            .iter()
            .map(|r| r.symbol.len())
            .max()
            .unwrap_or(0)
            .max("symbol".len());
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<width$}  {:>12}  {:>16}  {:>10}",
            "symbol", "calls", "elapsed_ns", "mean_ns"
        );
        for row in &self.rows {
            let _ = writeln!(
                out,
                "{:<width$}  {:>12}  {:>16}  {:>10}",
                row.symbol, row.calls, row.elapsed_ns, row.mean_ns
            );
        }
        let _ = writeln!(
            out,
            "{} symbols, {} calls, {} ns across {} dumps",
            self.rows.len(),
            self.total_calls,
            self.total_elapsed_ns,
            self.dumps
        );
        out
    }
}
