/// Structured logging for the network availability service.
///
/// Provides context-rich logging with pipeline stage and station
/// identifiers, timestamps, and severity levels. Supports console output
/// and an append-only log file for scheduled runs.
///
/// Console output always goes to stderr: stdout is reserved for the JSON
/// report when no output file is given.

use crate::consolidate::Indicators;
use crate::model::{PriorityTier, QualityFlag, QualityFlags, RowRejection};
use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

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
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Calculator,
    Tracker,
    Classifier,
    Assembler,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Ingest => write!(f, "INGEST"),
            Stage::Calculator => write!(f, "CALC"),
            Stage::Tracker => write!(f, "TRACK"),
            Stage::Classifier => write!(f, "CLASSIFY"),
            Stage::Assembler => write!(f, "ASSEMBLE"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Issue Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Routine data gap - expected in a large network, not actionable on its own
    Expected,
    /// The reported numbers for this station are degraded
    Degraded,
    /// Stored incident data was rewritten to match the measurements
    Correction,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueSeverity::Expected => write!(f, "EXPECTED"),
            IssueSeverity::Degraded => write!(f, "DEGRADED"),
            IssueSeverity::Correction => write!(f, "CORRECTION"),
        }
    }
}

/// Classify a quality flag by how much attention it deserves.
pub fn classify_flag(flag: QualityFlag) -> IssueSeverity {
    match flag {
        QualityFlag::FrequencyFallback
        | QualityFlag::MissingPreviousRecord
        | QualityFlag::UnclassifiedVariable => IssueSeverity::Expected,
        QualityFlag::UndefinedAvailability
        | QualityFlag::AnomalousAvailability
        | QualityFlag::NotReported => IssueSeverity::Degraded,
        QualityFlag::StateCorrected
        | QualityFlag::UnrecognizedState
        | QualityFlag::InvalidIncidentDate => IssueSeverity::Correction,
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

        if let Ok(mut guard) = LOGGER.lock() {
            *guard = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, stage: Stage, station: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let station_part = station.map(|s| format!(" [{}]", s)).unwrap_or_default();
        let log_entry = format!(
            "{} {} {}{}: {}",
            timestamp, level, stage, station_part, message
        );

        if self.console_timestamps {
            eprintln!("{}", log_entry);
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, station_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", stage, station_part, message),
                LogLevel::Info => eprintln!("   {}", message),
                LogLevel::Debug => eprintln!("   [DEBUG] {}{}: {}", stage, station_part, message),
            }
        }

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

/// Logging before `init_logger` is a no-op, and a poisoned lock is skipped.
fn emit(level: LogLevel, stage: Stage, station: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, stage, station, message);
        }
    }
}

pub fn info(stage: Stage, station: Option<&str>, message: &str) {
    emit(LogLevel::Info, stage, station, message);
}

pub fn warn(stage: Stage, station: Option<&str>, message: &str) {
    emit(LogLevel::Warning, stage, station, message);
}

pub fn error(stage: Stage, station: Option<&str>, message: &str) {
    emit(LogLevel::Error, stage, station, message);
}

pub fn debug(stage: Stage, station: Option<&str>, message: &str) {
    emit(LogLevel::Debug, stage, station, message);
}

// ---------------------------------------------------------------------------
// Structured Issue Logging
// ---------------------------------------------------------------------------

/// Log every flag raised on a station row at the level its severity calls for.
pub fn log_flags(stage: Stage, station: &str, flags: &QualityFlags) {
    for flag in flags {
        let severity = classify_flag(*flag);
        let message = format!("{} [{}]", flag, severity);
        match severity {
            IssueSeverity::Expected => debug(stage, Some(station), &message),
            IssueSeverity::Degraded | IssueSeverity::Correction => {
                warn(stage, Some(station), &message)
            }
        }
    }
}

/// Log a correction applied to a stored incident record.
pub fn log_correction(station: &str, description: &str) {
    warn(
        Stage::Tracker,
        Some(station),
        &format!("{} [{}]", description, IssueSeverity::Correction),
    );
}

/// Log rows rejected at the boundary.
pub fn log_rejections(rejections: &[RowRejection]) {
    for rejection in rejections {
        warn(Stage::Ingest, None, &format!("rejected {}", rejection));
    }
}

// ---------------------------------------------------------------------------
// Run Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a consolidation run
pub fn log_run_summary(indicators: &Indicators) {
    let tier_count = |tier: PriorityTier| indicators.tiers.get(&tier).copied().unwrap_or(0);
    let message = format!(
        "Run complete: {} stations, {} critical, {} anomalous, {} undefined | HIGH {} MEDIUM {} LOW {} | {} affected zones, {} closure candidates",
        indicators.total_stations,
        indicators.critical_stations,
        indicators.anomalies,
        indicators.undefined,
        tier_count(PriorityTier::High),
        tier_count(PriorityTier::Medium),
        tier_count(PriorityTier::Low),
        indicators.affected_zones.len(),
        indicators.closure_candidates,
    );

    if indicators.total_stations == 0 {
        error(Stage::Assembler, None, &message);
    } else if indicators.undefined == indicators.total_stations {
        warn(Stage::Assembler, None, &message);
    } else {
        info(Stage::Assembler, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_flag_classification() {
        assert_eq!(classify_flag(QualityFlag::FrequencyFallback), IssueSeverity::Expected);
        assert_eq!(classify_flag(QualityFlag::NotReported), IssueSeverity::Degraded);
        assert_eq!(classify_flag(QualityFlag::StateCorrected), IssueSeverity::Correction);
        assert_eq!(classify_flag(QualityFlag::UnrecognizedState), IssueSeverity::Correction);
    }

    #[test]
    fn test_logging_without_logger_is_a_no_op() {
        info(Stage::System, None, "nobody is listening");
        let mut flags = QualityFlags::new();
        flags.insert(QualityFlag::AnomalousAvailability);
        log_flags(Stage::Assembler, "1/ALPHA", &flags);
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(Stage::Calculator.to_string(), "CALC");
        assert_eq!(Stage::Tracker.to_string(), "TRACK");
        assert_eq!(Stage::System.to_string(), "SYS");
    }
}
