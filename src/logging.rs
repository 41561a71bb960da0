/// Structured logging for the comparison service
///
/// Provides context-rich logging with source and channel identifiers,
/// timestamps, and severity levels. Supports both console output and
/// file-based logging for batch runs. Logging never aborts a run: a log
/// file that cannot be written is reported on stderr and skipped.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::AnalysisError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
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
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Lidar,
    MetMast,
    Analysis,
    Config,
    Pipeline,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Lidar => write!(f, "LIDAR"),
            Source::MetMast => write!(f, "MAST"),
            Source::Analysis => write!(f, "ANALYSIS"),
            Source::Config => write!(f, "CONFIG"),
            Source::Pipeline => write!(f, "PIPE"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Row-level condition the pipeline recovers from (dropped row, empty month)
    Expected,
    /// Structural problem that invalidates the affected analysis
    Unexpected,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
        }
    }
}

/// Classify an analysis error by whether the run can carry on around it.
pub fn classify_failure(err: &AnalysisError) -> FailureType {
    match err {
        AnalysisError::MalformedTimestamp(_) | AnalysisError::EmptyInput(_) => {
            FailureType::Expected
        }
        _ => FailureType::Unexpected,
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
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        match LOGGER.lock() {
            Ok(mut slot) => *slot = Some(logger),
            Err(poisoned) => *poisoned.into_inner() = Some(logger),
        }
    }

    fn log(&self, level: LogLevel, source: &Source, channel: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let channel_part = channel.map(|c| format!(" [{}]", c)).unwrap_or_default();
        let log_entry = format!(
            "{} {} {}{}: {}",
            timestamp, level, source, channel_part, message
        );

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", source, channel_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", source, channel_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
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

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, source: Source, channel: Option<&str>, message: &str) {
    // A poisoned lock only means another thread panicked mid-log; keep logging.
    let guard = match LOGGER.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(logger) = guard.as_ref() {
        logger.log(level, &source, channel, message);
    }
}

/// Log a general informational message
pub fn info(source: Source, channel: Option<&str>, message: &str) {
    emit(LogLevel::Info, source, channel, message);
}

/// Log a warning message
pub fn warn(source: Source, channel: Option<&str>, message: &str) {
    emit(LogLevel::Warning, source, channel, message);
}

/// Log an error message
pub fn error(source: Source, channel: Option<&str>, message: &str) {
    emit(LogLevel::Error, source, channel, message);
}

/// Log a debug message
pub fn debug(source: Source, channel: Option<&str>, message: &str) {
    emit(LogLevel::Debug, source, channel, message);
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log an analysis failure with automatic classification
pub fn log_failure(source: Source, channel: Option<&str>, operation: &str, err: &AnalysisError) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => warn(source, channel, &message),
        FailureType::Unexpected => error(source, channel, &message),
    }
}

// ---------------------------------------------------------------------------
// Ingest Summary Logging
// ---------------------------------------------------------------------------

/// Log how many rows of a channel survived ingestion and QC
pub fn log_ingest_summary(
    source: Source,
    channel: &str,
    kept: usize,
    malformed: usize,
    rejected: usize,
) {
    let total = kept + malformed + rejected;
    let message = format!(
        "Ingest complete: {}/{} rows kept, {} malformed timestamps, {} QC rejects",
        kept, total, malformed, rejected
    );

    if kept == 0 && total > 0 {
        error(source, Some(channel), &message);
    } else if malformed > 0 {
        warn(source, Some(channel), &message);
    } else {
        info(source, Some(channel), &message);
    }
}
