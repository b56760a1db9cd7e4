//! Structured logging for invigil.
//!
//! `tracing`-based logging with configurable format and destination.
//!
//! # Correlation Fields
//!
//! Use these field names consistently in spans and events:
//! - `session_id`, `attempt_id`, `assessment_id`: proctoring context
//! - `user_id`: owner of the attempt (never the reviewer)
//! - `kind`, `severity`, `flagged`: violation context
//! - `reason`: termination reason
//!
//! # Safety
//!
//! Violation `details` are user-supplied free text. Log them at `debug`
//! or below only, never at `info` and above.

use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Global flag to track if logging has been initialized.
static LOGGING_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-friendly output for interactive use.
    #[default]
    Pretty,
    /// JSON lines for CI and ops pipelines.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level filter (trace, debug, info, warn, error).
    /// Can be overridden by the `RUST_LOG` environment variable.
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// Optional log file; when set, logs are appended there instead of
    /// stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// Error type for logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("logging already initialized")]
    AlreadyInitialized,

    #[error("failed to create log file: {0}")]
    FileCreate(#[from] io::Error),
}

/// Initialize the global logging subscriber.
///
/// Call once at startup; subsequent calls return
/// `Err(LogError::AlreadyInitialized)`. `RUST_LOG` overrides the
/// configured level.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    if LOGGING_INITIALIZED.get().is_some() {
        return Err(LogError::AlreadyInitialized);
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_writer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Some(
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?,
            )
        }
        None => None,
    };

    match (config.format, file_writer) {
        (LogFormat::Pretty, None) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(io::stderr)
                        .with_target(true)
                        .with_ansi(true),
                )
                .init();
        }
        (LogFormat::Pretty, Some(file)) => {
            let file = std::sync::Arc::new(file);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(file).with_target(true).with_ansi(false))
                .init();
        }
        (LogFormat::Json, None) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(io::stderr).with_target(true))
                .init();
        }
        (LogFormat::Json, Some(file)) => {
            let file = std::sync::Arc::new(file);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(file).with_target(true))
                .init();
        }
    }

    let _ = LOGGING_INITIALIZED.set(true);
    Ok(())
}
