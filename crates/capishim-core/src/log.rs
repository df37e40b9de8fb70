//! Structured JSONL logging for trampolines and statistics.
//!
//! Provides:
//! - [`LogEntry`]: one JSONL record with the required fields `timestamp`,
//!   `trace_id`, `level` and `event`, plus optional call context.
//! - [`LogSink`]: writes records to stderr, a file, or an in-memory buffer.
//! - [`ArgRepr`]: how forwarded arguments and results are rendered
//!   (addresses as hex, `*const c_char` as decoded, bounded strings).

use std::any::TypeId;
use std::ffi::c_char;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::util::bounded_c_str;

/// Event names written by the registry.
pub mod events {
    /// Trampoline entry with formatted arguments.
    pub const CALL: &str = "call";
    /// Trampoline exit with the formatted result (non-void symbols only).
    pub const RETURN: &str = "return";
    /// First successful resolution of a symbol.
    pub const RESOLVE: &str = "resolve";
    /// One statistics node during a dump.
    pub const STATS: &str = "stats";
    /// Summary closing a statistics dump.
    pub const STATS_DUMP: &str = "stats_dump";
    /// Abort after an unresolved symbol or a returning no-return call.
    pub const ABORT: &str = "abort";
    /// Configuration problem detected at start-up.
    pub const CONFIG: &str = "config";
}

/// Longest C string prefix rendered in call records.
pub const C_STR_LOG_LIMIT: usize = 64;

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Canonical structured log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    #[serde(default)]
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calls: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ns: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_calls: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    /// Create an entry with the required fields; the sink assigns `trace_id`.
    #[must_use]
    pub fn new(level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: String::new(),
            level,
            event: event.into(),
            symbol: None,
            args: None,
            result: None,
            calls: None,
            elapsed_ns: None,
            total_calls: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = Some(args);
        self
    }

    #[must_use]
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    /// Set call count and cumulative time of a statistics record.
    #[must_use]
    pub fn with_counters(mut self, calls: u64, elapsed_ns: u64) -> Self {
        self.calls = Some(calls);
        self.elapsed_ns = Some(elapsed_ns);
        self
    }

    #[must_use]
    pub fn with_total_calls(mut self, total: u64) -> Self {
        self.total_calls = Some(total);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Writes structured JSONL records and numbers them.
pub struct LogSink {
    writer: Box<dyn Write + Send>,
    seq: u64,
    run_id: String,
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("seq", &self.seq)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

impl LogSink {
    fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer,
            seq: 0,
            run_id: format!("capishim::{}", std::process::id()),
        }
    }

    /// Sink writing to standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::with_writer(Box::new(io::stderr()))
    }

    /// Sink appending to `path`, one flushed line per record.
    pub fn to_file(path: &Path) -> io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::with_writer(Box::new(io::LineWriter::new(file))))
    }

    /// Sink writing into a shared in-memory buffer (for tests and tooling).
    #[must_use]
    pub fn to_buffer() -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        (Self::with_writer(Box::new(buffer.clone())), buffer)
    }

    /// Sink discarding everything.
    #[must_use]
    pub fn discard() -> Self {
        Self::with_writer(Box::new(io::sink()))
    }

    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("{}::{:06}", self.run_id, self.seq)
    }

    /// Write one record, assigning a trace id if it has none.
    pub fn emit(&mut self, mut entry: LogEntry) -> io::Result<()> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        }
        let line = serde_json::to_string(&entry).map_err(io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Cloneable in-memory byte buffer behind a [`LogSink::to_buffer`] sink.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Everything written so far, lossily decoded.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    /// Parse every complete line as a [`LogEntry`], skipping malformed lines.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.contents()
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Argument rendering
// ---------------------------------------------------------------------------

/// Rendering of a forwarded argument or result in call records.
pub trait ArgRepr {
    /// Text for the record, or `None` when the value is not logged (the unit
    /// result of a void call).
    ///
    /// # Safety
    ///
    /// `*const c_char` values are read as C strings (bounded by
    /// [`C_STR_LOG_LIMIT`]); they must be null or point to readable memory,
    /// as the forwarded function's contract already requires.
    unsafe fn repr(&self) -> Option<String>;
}

impl ArgRepr for () {
    unsafe fn repr(&self) -> Option<String> {
        None
    }
}

macro_rules! display_repr {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ArgRepr for $ty {
                unsafe fn repr(&self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

display_repr!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool
);

impl<T: ?Sized + 'static> ArgRepr for *const T {
    unsafe fn repr(&self) -> Option<String> {
        if TypeId::of::<T>() == TypeId::of::<c_char>() {
            // SAFETY: forwarded from the caller's contract (see trait docs).
            return Some(unsafe { describe_c_str(self.cast::<c_char>()) });
        }
        Some(describe_addr(self.cast::<u8>().addr()))
    }
}

impl<T: ?Sized + 'static> ArgRepr for *mut T {
    unsafe fn repr(&self) -> Option<String> {
        Some(describe_addr(self.cast::<u8>().addr()))
    }
}

/// Render an address as `0x...` (or `NULL`).
#[must_use]
pub fn describe_addr(addr: usize) -> String {
    if addr == 0 {
        "NULL".to_string()
    } else {
        format!("{addr:#x}")
    }
}

/// Render a C string as a quoted, escaped, bounded literal.
///
/// # Safety
///
/// `ptr` must be null or readable up to its terminator or
/// [`C_STR_LOG_LIMIT`] bytes.
pub unsafe fn describe_c_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return "NULL".to_string();
    }
    // SAFETY: non-null and readable per the function contract.
    let (bytes, truncated) = unsafe { bounded_c_str(ptr, C_STR_LOG_LIMIT) };
    let text = String::from_utf8_lossy(bytes);
    if truncated {
        format!("{text:?}...")
    } else {
        format!("{text:?}")
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

pub(crate) fn now_utc() -> String {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = since_epoch.as_secs();
    let (year, month, day) = civil_from_days((secs / 86_400) as i64);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{:03}Z",
        (secs % 86_400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
        since_epoch.subsec_millis(),
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
