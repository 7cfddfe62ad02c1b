//! # Logging Utilities
//!
//! Logging infrastructure for Tether using `tracing`.
//!
//! This module provides structured logging with support for:
//! - Pretty output for development and JSON output for log collectors
//! - Environment variable configuration
//! - Log level filtering, including per-crate filters through `RUST_LOG`
//! - An optional log file next to the console output
//!
//! Console output goes to stderr so it never mixes with command output on
//! stdout.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether_utils::init_logging;
//!
//! // Keep the guard alive for as long as log lines should reach the file
//! let _guard = init_logging().expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level filter (e.g., `RUST_LOG=debug`, `RUST_LOG=tether_core=trace`)
//! - `TETHER_LOG_FORMAT`: Set output format (`json` or `pretty`, default: `pretty`)
//! - `TETHER_LOG_FILE`: Optional path to a log file, rotated daily
//!
//! Subscription bookkeeping in `tether_core` logs every subscribe and
//! unsubscribe at `trace` level, and every protocol violation at `error`
//! level before it is acted upon.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::{DefaultFields, Format, Full};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Output format variable
pub const LOG_FORMAT_ENV: &str = "TETHER_LOG_FORMAT";

/// Log file variable
pub const LOG_FILE_ENV: &str = "TETHER_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default for development)
    #[default]
    Pretty,
    /// JSON format (for log collectors)
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for LogFormat
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Keeps the background log file writer running.
///
/// Dropping it flushes and stops file logging. Console logging is not
/// affected.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LoggingGuard
{
    worker: Option<WorkerGuard>,
}

impl LoggingGuard
{
    /// Whether a log file is being written.
    pub fn writes_file(&self) -> bool
    {
        self.worker.is_some()
    }
}

/// Initialize logging with default settings
///
/// Reads configuration from environment variables:
/// - `RUST_LOG`: Log level filter (e.g., `debug`, `tether_core=trace`)
/// - `TETHER_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
/// - `TETHER_LOG_FILE`: Optional path to log file
///
/// ## Errors
///
/// Returns an error if:
/// - Logging is already initialized
/// - `TETHER_LOG_FORMAT` holds an unknown format
/// - File logging fails (if `TETHER_LOG_FILE` is set)
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    let format = match env::var(LOG_FORMAT_ENV) {
        Ok(raw) => LogFormat::from_str(&raw)?,
        Err(_) => LogFormat::Pretty,
    };

    // RUST_LOG may hold a full filter directive, not just a level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    init_logging_internal(format, filter, log_file_from_env())
}

/// Initialize logging with explicit level and format
///
/// The explicit level wins over `RUST_LOG`. `TETHER_LOG_FILE` is still
/// honoured.
///
/// ## Example
///
/// ```rust,no_run
/// use tether_utils::{LogFormat, LogLevel, init_logging_with_level};
///
/// let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Pretty)
///     .expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging fails.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    let filter = EnvFilter::new(Level::from(level).to_string());
    init_logging_internal(format, filter, log_file_from_env())
}

/// Initialize file-only logging in `dir`
///
/// Writes to `<dir>/YYYY-MM-DD-tether.log` (UTC date), creating `dir` if
/// needed, and nothing to the console. Returns the path of the log file.
///
/// `level` defaults to `RUST_LOG`, then `INFO`.
///
/// ## Errors
///
/// Returns an error if logging is already initialized or the directory
/// cannot be created.
pub fn init_logging_to_dir(dir: &Path, level: Option<LogLevel>) -> Result<(PathBuf, LoggingGuard), LoggingError>
{
    std::fs::create_dir_all(dir)?;
    let log_file = dir.join(dated_log_name(&Utc::now().format("%Y-%m-%d").to_string()));

    let filter = match level {
        Some(level) => EnvFilter::new(Level::from(level).to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
    };

    let (file_layer, guard) = file_layer(&log_file, LogFormat::Pretty, filter, false);
    Registry::default()
        .with(vec![file_layer])
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok((log_file, guard))
}

fn log_file_from_env() -> Option<PathBuf>
{
    env::var_os(LOG_FILE_ENV).filter(|raw| !raw.is_empty()).map(PathBuf::from)
}

fn dated_log_name(date: &str) -> String
{
    format!("{date}-tether.log")
}

fn init_logging_internal(
    format: LogFormat,
    filter: EnvFilter,
    log_file: Option<PathBuf>,
) -> Result<LoggingGuard, LoggingError>
{
    let mut layers: Vec<BoxedLayer> = vec![console_layer(format, filter.clone())];

    let guard = match log_file {
        Some(path) => {
            let (layer, guard) = file_layer(&path, format, filter, true);
            layers.push(layer);
            guard
        }
        None => LoggingGuard::default(),
    };

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok(guard)
}

fn console_layer(format: LogFormat, filter: EnvFilter) -> BoxedLayer
{
    match format {
        LogFormat::Pretty => fmt_layer()
            .with_ansi(true)
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt_layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed(),
    }
}

/// Layer writing to `path`. With `rotate`, a new file is started every day.
fn file_layer(path: &Path, format: LogFormat, filter: EnvFilter, rotate: bool) -> (BoxedLayer, LoggingGuard)
{
    let dir = path.parent().filter(|parent| !parent.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let name = path.file_name().unwrap_or_default();
    let appender = if rotate {
        tracing_appender::rolling::daily(dir, name)
    } else {
        // The date is already part of the file name
        tracing_appender::rolling::never(dir, name)
    };
    let (writer, worker) = tracing_appender::non_blocking(appender);

    let layer = match format {
        LogFormat::Pretty => fmt_layer()
            .with_ansi(false) // No ANSI in files
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt_layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    };

    (layer, LoggingGuard { worker: Some(worker) })
}

/// Shared field configuration of every layer
fn fmt_layer() -> fmt::Layer<Registry, DefaultFields, Format<Full, ChronoUtc>>
{
    fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}. Use 'error', 'warn', 'info', 'debug' or 'trace'")]
    InvalidLevel(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
