//! CLI entrypoint for the capishim tooling.

use std::path::{Path, PathBuf};

use capishim_harness::{StatsReport, SymbolManifest, check_library, validate_log_file};
use clap::{Parser, Subcommand};

/// Tooling for the capishim forwarding layer.
#[derive(Debug, Parser)]
#[command(name = "capishim-harness")]
#[command(about = "Inspect, check and report on the capishim symbol table")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the exported symbol table as JSON.
    Manifest {
        /// Output JSON path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Resolve every exported symbol against a shared library.
    Check {
        /// Library path or soname passed to dlopen.
        #[arg(long)]
        library: PathBuf,
        /// Prefix prepended to every name before lookup.
        #[arg(long)]
        prefix: Option<String>,
        /// Output JSON path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Summarize statistics dumps from a JSONL log.
    Report {
        /// JSONL log written with CAPISHIM_LOG_FILE.
        #[arg(long)]
        log: PathBuf,
        /// `table` or `json`.
        #[arg(long, default_value = "table")]
        format: String,
        /// Include symbols that were never called.
        #[arg(long)]
        all: bool,
    },
    /// Validate every record of a JSONL log.
    ValidateLog {
        #[arg(long)]
        log: PathBuf,
    },
}

fn write_output(output: Option<&Path>, body: &str) -> std::io::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, body)?;
            eprintln!("Wrote {}", path.display());
            Ok(())
        }
        None => {
            println!("{body}");
            Ok(())
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Manifest { output } => {
            let manifest = SymbolManifest::current();
            write_output(output.as_deref(), &manifest.to_json()?)?;
        }
        Command::Check {
            library,
            prefix,
            output,
        } => {
            let report = check_library(&library, prefix.as_deref())?;
            eprintln!(
                "{}: {}/{} symbols bound",
                report.library, report.bound, report.total
            );
            write_output(output.as_deref(), &serde_json::to_string_pretty(&report)?)?;
            if !report.is_complete() {
                return Err(format!("{} symbols missing", report.missing.len()).into());
            }
        }
        Command::Report { log, format, all } => {
            let report = StatsReport::from_file(&log, all)?;
            print!("{}", report.render(&format)?);
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for error in &errors {
                eprintln!("{error}");
            }
            if !errors.is_empty() {
                return Err(format!("{} errors in {lines} records", errors.len()).into());
            }
            eprintln!("{}: {lines} records valid", log.display());
        }
    }

    Ok(())
}
