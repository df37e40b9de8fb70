//! Schema validation for JSONL records written by the shim.

use std::path::Path;

use capishim_core::LogEntry;
use capishim_core::log::events;
use serde_json::{Map, Value};

const KNOWN_EVENTS: [&str; 7] = [
    events::CALL,
    events::RETURN,
    events::RESOLVE,
    events::STATS,
    events::STATS_DUMP,
    events::ABORT,
    events::CONFIG,
];

/// A validation error for a single log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for LogValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}: field '{}': {}",
            self.line_number, self.field, self.message
        )
    }
}

/// Validate a single JSONL line against the record schema.
///
/// Returns the parsed entry, or every problem found on the line.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    let mut errors = Vec::new();
    let fail = |errors: &mut Vec<LogValidationError>, field: &str, message: String| {
        errors.push(LogValidationError {
            line_number,
            field: field.to_string(),
            message,
        });
    };

    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            fail(&mut errors, "<json>", format!("invalid JSON: {e}"));
            return Err(errors);
        }
    };
    let Some(obj) = value.as_object() else {
        fail(&mut errors, "<root>", "expected JSON object".to_string());
        return Err(errors);
    };

    for field in ["timestamp", "trace_id", "level", "event"] {
        if !obj.contains_key(field) {
            fail(&mut errors, field, "required field missing".to_string());
        }
    }

    if let Some(level) = obj.get("level").and_then(Value::as_str)
        && !["trace", "debug", "info", "warn", "error", "fatal"].contains(&level)
    {
        fail(&mut errors, "level", format!("invalid level: '{level}'"));
    }

    if let Some(trace_id) = obj.get("trace_id").and_then(Value::as_str)
        && !trace_id.contains("::")
    {
        fail(
            &mut errors,
            "trace_id",
            format!("trace_id should follow capishim::<pid>::<seq> format, got: '{trace_id}'"),
        );
    }

    if let Some(event) = obj.get("event").and_then(Value::as_str) {
        if KNOWN_EVENTS.contains(&event) {
            for (field, message) in event_field_errors(event, obj) {
                fail(&mut errors, field, message);
            }
        } else {
            fail(&mut errors, "event", format!("unknown event: '{event}'"));
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    serde_json::from_value::<LogEntry>(value).map_err(|e| {
        vec![LogValidationError {
            line_number,
            field: "<deserialization>".to_string(),
            message: format!("failed to deserialize: {e}"),
        }]
    })
}

fn event_field_errors(event: &str, obj: &Map<String, Value>) -> Vec<(&'static str, String)> {
    let mut errors = Vec::new();
    let has_symbol = obj
        .get("symbol")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty());
    let has_u64 = |field: &str| obj.get(field).is_some_and(Value::is_u64);

    match event {
        events::CALL => {
            if !has_symbol {
                errors.push(("symbol", "call records must name a symbol".to_string()));
            }
            if !obj.get("args").is_some_and(Value::is_array) {
                errors.push(("args", "call records must include an args array".to_string()));
            }
        }
        events::RETURN => {
            if !has_symbol {
                errors.push(("symbol", "return records must name a symbol".to_string()));
            }
            if !obj.get("result").is_some_and(Value::is_string) {
                errors.push(("result", "return records must include a result".to_string()));
            }
        }
        events::ABORT if !has_symbol => {
            errors.push(("symbol", "abort records must name a symbol".to_string()));
        }
        events::STATS => {
            if !has_symbol {
                errors.push(("symbol", "stats records must name a symbol".to_string()));
            }
            for field in ["calls", "elapsed_ns"] {
                if !has_u64(field) {
                    errors.push((field, format!("stats records must include unsigned '{field}'")));
                }
            }
        }
        events::STATS_DUMP if !has_u64("total_calls") => {
            errors.push((
                "total_calls",
                "stats_dump records must include unsigned total_calls".to_string(),
            ));
        }
        _ => {}
    }

    if event == events::ABORT
        && let Some(level) = obj.get("level").and_then(Value::as_str)
        && level != "fatal"
    {
        errors.push(("level", format!("abort records must be fatal, got '{level}'")));
    }

    errors
}

/// Validate an entire JSONL file.
///
/// Returns the number of non-empty lines and any validation errors found.
pub fn validate_log_file(path: &Path) -> Result<(usize, Vec<LogValidationError>), std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    let mut all_errors = Vec::new();
    let mut line_count = 0;

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        line_count += 1;
        if let Err(errs) = validate_log_line(line, i + 1) {
            all_errors.extend(errs);
        }
    }

    Ok((line_count, all_errors))
}
