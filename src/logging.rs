//! Tracing configuration and log routing.
//!
//! Logs always go to stdout with a compact formatter. A file layer is added
//! when a target can be resolved: `STUDY_MENTOR_LOG_FILE` points at an
//! explicit file, otherwise `logs/studymentor.log` is used. The file writer
//! is non-blocking so request paths never wait on disk.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "studymentor.log";

/// Configure tracing subscribers for stdout and optional file logging.
///
/// Filtering respects `RUST_LOG` and defaults to `info`. When the log file
/// cannot be opened the server still starts with stdout logging only.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    match file_writer() {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
}

fn log_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("STUDY_MENTOR_LOG_FILE") {
        return Some(PathBuf::from(path));
    }
    if let Err(err) = std::fs::create_dir_all(LOG_DIR) {
        eprintln!("Failed to create {LOG_DIR} directory: {err}");
        return None;
    }
    Some(PathBuf::from(LOG_DIR).join(LOG_FILE))
}

fn file_writer() -> Option<NonBlocking> {
    let path = log_file_path()?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| eprintln!("Failed to open log file {}: {err}", path.display()))
        .ok()?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    // Keep the writer's flush thread alive for the process lifetime.
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}
