//! Structured logging for the air-quality monitoring service
//!
//! Provides context-rich logging with component tags, location identifiers,
//! timestamps, and severity levels. Supports both console output and
//! file-based logging for long-running dashboard hosts.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::AqiError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Waqi,
    Cache,
    Session,
    Config,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Waqi => write!(f, "WAQI"),
            Component::Cache => write!(f, "CACHE"),
            Component::Session => write!(f, "SESSION"),
            Component::Config => write!(f, "CONFIG"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Transient - network trouble or provider outage, safe to retry later
    Transient,
    /// Needs a fix - bad token, unknown location, or an upstream contract change
    Actionable,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Transient => write!(f, "TRANSIENT"),
            FailureType::Actionable => write!(f, "ACTIONABLE"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    fn log(&self, level: LogLevel, component: Component, location: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let location_part = location.map(|s| format!(" [{}]", s)).unwrap_or_default();
        let log_entry = format_entry(level, component, location, message);

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", component, location_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", component, location_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", component, location_part, message),
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

/// Full single-line form used for files and timestamped console output.
fn format_entry(level: LogLevel, component: Component, location: Option<&str>, message: &str) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    let location_part = location.map(|s| format!(" [{}]", s)).unwrap_or_default();
    format!("{} {} {}{}: {}", timestamp, level, component, location_part, message)
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger. Until this is called, log calls are no-ops.
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    let logger = Logger {
        min_level,
        log_file: log_file.map(String::from),
        console_timestamps,
    };
    if let Ok(mut slot) = LOGGER.lock() {
        *slot = Some(logger);
    }
}

fn emit(level: LogLevel, component: Component, location: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, component, location, message);
        }
    }
}

/// Log a general informational message
pub fn info(component: Component, location: Option<&str>, message: &str) {
    emit(LogLevel::Info, component, location, message);
}

/// Log a warning message
pub fn warn(component: Component, location: Option<&str>, message: &str) {
    emit(LogLevel::Warning, component, location, message);
}

/// Log an error message
pub fn error(component: Component, location: Option<&str>, message: &str) {
    emit(LogLevel::Error, component, location, message);
}

/// Log a debug message
pub fn debug(component: Component, location: Option<&str>, message: &str) {
    emit(LogLevel::Debug, component, location, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a pipeline failure by its error kind.
pub fn classify_failure(err: &AqiError) -> FailureType {
    if err.is_retryable() {
        FailureType::Transient
    } else {
        FailureType::Actionable
    }
}

/// The component a failure originated in.
fn failure_component(err: &AqiError) -> Component {
    match err {
        AqiError::Configuration(_) => Component::Config,
        AqiError::SourceUnavailable { .. }
        | AqiError::SourceRejected(_)
        | AqiError::MalformedPayload(_) => Component::Waqi,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a location failure with automatic classification: transient
/// failures are warnings, everything else is an error.
pub fn log_location_failure(location_id: &str, operation: &str, err: &AqiError) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);
    let component = failure_component(err);

    match failure_type {
        FailureType::Transient => warn(component, Some(location_id), &message),
        FailureType::Actionable => error(component, Some(location_id), &message),
    }
}

// ---------------------------------------------------------------------------
// Refresh Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a refresh over all monitored locations
pub fn log_refresh_summary(total: usize, successful: usize, failed: usize) {
    let message = format!(
        "Refresh complete: {}/{} successful, {} failed",
        successful, total, failed
    );

    if failed == 0 {
        info(Component::System, None, &message);
    } else if successful == 0 {
        error(Component::System, None, &message);
    } else {
        warn(Component::System, None, &message);
    }
}
