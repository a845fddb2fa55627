//! Log setup for the server and the command line tool.
//!
//! The server writes compact lines to stdout and mirrors them, with targets and without colour,
//! into a log file. `CONTRACTLENS_LOG_FILE` picks the file; without it the server appends to
//! `logs/contractlens.log`. The CLI only logs to stderr so its stdout stays machine-readable.
use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_VAR: &str = "CONTRACTLENS_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_NAME: &str = "contractlens.log";

/// Flushes buffered file output on exit; must outlive every log call.
static FILE_FLUSH_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn filter_or(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install the server subscriber. `RUST_LOG` overrides the `info` default.
///
/// If the log file cannot be opened the server keeps running with stdout only.
pub fn init_tracing() {
    let console = fmt::layer().with_target(false).compact();
    let file = file_writer().map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter_or("info"))
        .with(console)
        .with(file)
        .init();
}

/// Install the CLI subscriber: stderr only, `warn` unless `RUST_LOG` says otherwise.
pub fn init_cli_tracing() {
    tracing_subscriber::registry()
        .with(filter_or("warn"))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

fn file_writer() -> Option<NonBlocking> {
    let (writer, guard) = match std::env::var(LOG_FILE_VAR) {
        Ok(path) => open_append(Path::new(&path))?,
        Err(_) => {
            if let Err(err) = std::fs::create_dir_all(DEFAULT_LOG_DIR) {
                eprintln!("Log directory {DEFAULT_LOG_DIR} unavailable: {err}");
                return None;
            }
            tracing_appender::non_blocking(tracing_appender::rolling::never(
                DEFAULT_LOG_DIR,
                DEFAULT_LOG_NAME,
            ))
        }
    };
    let _ = FILE_FLUSH_GUARD.set(guard);
    Some(writer)
}

fn open_append(path: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        Ok(file) => Some(tracing_appender::non_blocking(file)),
        Err(err) => {
            eprintln!("Log file {} unavailable: {err}", path.display());
            None
        }
    }
}
