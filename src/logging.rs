//! Structured logging for the MIDI ping-pong tester
//!
//! Loggers write one line per entry to stderr, leaving stdout to the
//! per-iteration report. Every logger made by one [`LoggerFactory`] stamps
//! the same session ID, and `start_operation`/`end_operation` bracket a
//! measurement run with a correlation ID that entries in between inherit.

use crate::codec;
use crate::error::AppError;
use crate::models::{Config, RoundTripOutcome};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Severity, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Per-frame detail: discarded deliveries, dropped channel messages
    Debug = 0,
    /// Run start, port names, run summary
    Info = 1,
    /// Mismatches, timeouts, early end of the input stream
    Warn = 2,
    /// Transport failures
    Error = 3,
    /// Used as a threshold to silence a logger entirely
    Fatal = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    fn painted(&self) -> String {
        let label = format!("{:>5}", self.as_str());
        match self {
            LogLevel::Debug => label.cyan().to_string(),
            LogLevel::Info => label.green().to_string(),
            LogLevel::Warn => label.yellow().to_string(),
            LogLevel::Error => label.red().to_string(),
            LogLevel::Fatal => label.magenta().to_string(),
        }
    }
}

/// One emitted entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Component name, e.g. `LOOP` or `CORRELATOR`
    pub logger: String,
    pub correlation_id: Option<String>,
    pub fields: HashMap<String, serde_json::Value>,
}

/// Line format
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// `timestamp LEVEL [NAME] message [corr] {k=v, ...}`
    Console,
    /// One JSON object per line
    Json,
}

/// State shared by a logger and everything derived from it
#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
    /// Correlation ID of the operation in progress
    operation_id: Option<String>,
}

/// Leveled structured logger
///
/// Clones share the same context, so a clone handed to a background task
/// keeps reporting the session ID of the logger it came from.
#[derive(Clone)]
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    format: LogFormat,
    name: String,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    /// Console logger at `Info`, colored
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            format: LogFormat::Console,
            name: name.into(),
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Level and format from the run configuration
    ///
    /// `--debug` switches to JSON lines at `Debug`; `--verbose` shows `Info`;
    /// otherwise only warnings and errors reach stderr.
    pub fn with_config(name: impl Into<String>, config: &Config) -> Self {
        let min_level = match (config.debug, config.verbose) {
            (true, _) => LogLevel::Debug,
            (false, true) => LogLevel::Info,
            (false, false) => LogLevel::Warn,
        };

        Self {
            min_level,
            use_color: config.enable_color,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            ..Self::new(name)
        }
    }

    /// Same logger under another component name, sharing the context
    pub fn named(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn set_session_id(&self, session_id: String) {
        self.context.write().await.session_id = Some(session_id);
    }

    /// Open a correlated operation and log its start
    pub async fn start_operation(&self, operation_name: &str) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        self.context.write().await.operation_id = Some(correlation_id.clone());

        self.info(&format!("Started operation: {}", operation_name))
            .correlation_id(&correlation_id)
            .field("operation", operation_name)
            .field("operation_type", "start")
            .log()
            .await;

        correlation_id
    }

    /// Log the end of an operation and clear it if it is still current
    pub async fn end_operation(&self, correlation_id: &str, operation_name: &str, success: bool) {
        self.info(&format!("Completed operation: {} (success: {})", operation_name, success))
            .correlation_id(correlation_id)
            .field("operation", operation_name)
            .field("operation_type", "end")
            .field("success", success)
            .log()
            .await;

        let mut context = self.context.write().await;
        if context.operation_id.as_deref() == Some(correlation_id) {
            context.operation_id = None;
        }
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, LogLevel::Error, message)
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if entry.level < self.min_level {
            return;
        }

        {
            let context = self.context.read().await;
            if let Some(session_id) = &context.session_id {
                entry.fields.insert("session_id".to_string(), session_id.clone().into());
            }
            if entry.correlation_id.is_none() {
                entry.correlation_id = context.operation_id.clone();
            }
        }

        let line = match self.format {
            LogFormat::Console => self.format_console(&entry),
            LogFormat::Json => self.format_json(&entry),
        };
        let _ = writeln!(io::stderr(), "{}", line);
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let level = if self.use_color {
            entry.level.painted()
        } else {
            format!("{:>5}", entry.level.as_str())
        };

        let mut line = format!(
            "{} {} [{}] {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            level,
            entry.logger,
            entry.message
        );

        if let Some(correlation_id) = &entry.correlation_id {
            let short = correlation_id.get(..8).unwrap_or(correlation_id);
            line.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let mut pairs: Vec<String> = entry.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            pairs.sort();
            line.push_str(&format!(" {{{}}}", pairs.join(", ")));
        }

        line
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        serde_json::to_string(entry).unwrap_or_else(|_| {
            serde_json::json!({ "level": entry.level.as_str(), "message": entry.message }).to_string()
        })
    }
}

/// Accumulates fields for one entry; nothing is written until [`log`](Self::log)
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: &str) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message: message.to_string(),
                logger: logger.name.clone(),
                correlation_id: None,
                fields: HashMap::new(),
            },
        }
    }

    fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// Raw MIDI bytes as a hex string
    pub fn bytes(self, key: &str, bytes: &[u8]) -> Self {
        self.field(key, codec::to_hex(bytes))
    }

    /// Outcome label, plus the sample for a match or the observed frame for a mismatch
    pub fn outcome(self, outcome: &RoundTripOutcome) -> Self {
        let builder = self.field("outcome", outcome.label());
        match outcome {
            RoundTripOutcome::Matched(sample) => builder
                .field("offset_s", sample.offset_secs())
                .field("rtt_ms", sample.rtt_ms()),
            RoundTripOutcome::Mismatch(bytes) => builder.bytes("observed", bytes),
            RoundTripOutcome::Timeout => builder,
        }
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error_exit_code", error.exit_code())
    }

    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }

    #[cfg(test)]
    fn into_entry(self) -> LogEntry {
        self.entry
    }
}

/// Creates loggers that share one session ID
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub async fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_config(name, &self.config);
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sample;
    use std::time::Duration;

    fn entry(level: LogLevel, message: &str) -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            logger: "LOOP".to_string(),
            correlation_id: None,
            fields: HashMap::new(),
        }
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Fatal);
    }

    #[test]
    fn test_logger_with_config() {
        let config = Config {
            debug: true,
            enable_color: false,
            ..Default::default()
        };

        let logger = Logger::with_config("TEST", &config);
        assert_eq!(logger.min_level, LogLevel::Debug);
        assert_eq!(logger.format, LogFormat::Json);
        assert!(!logger.use_color);

        let verbose = Logger::with_config("TEST", &Config { verbose: true, ..Default::default() });
        assert_eq!(verbose.min_level, LogLevel::Info);

        let quiet = Logger::with_config("TEST", &Config::default());
        assert_eq!(quiet.min_level, LogLevel::Warn);
        assert_eq!(quiet.format, LogFormat::Console);
    }

    #[tokio::test]
    async fn test_named_logger_shares_context() {
        let logger = Logger::new("LOOP");
        let child = logger.named("CORRELATOR");
        logger.set_session_id("session-1".to_string()).await;

        assert_eq!(child.name(), "CORRELATOR");
        let context = child.context.read().await;
        assert_eq!(context.session_id.as_deref(), Some("session-1"));
    }

    #[tokio::test]
    async fn test_operation_correlation() {
        let logger = Logger::new("TEST").with_level(LogLevel::Fatal);
        let correlation_id = logger.start_operation("session").await;
        assert!(!correlation_id.is_empty());
        assert_eq!(
            logger.context.read().await.operation_id.as_deref(),
            Some(correlation_id.as_str())
        );

        // Ending some other operation leaves the current one in place.
        logger.end_operation("other", "calibration", true).await;
        assert!(logger.context.read().await.operation_id.is_some());

        logger.end_operation(&correlation_id, "session", true).await;
        assert!(logger.context.read().await.operation_id.is_none());
    }

    #[test]
    fn test_outcome_fields() {
        let logger = Logger::new("TEST");
        let matched = RoundTripOutcome::Matched(Sample::new(Duration::from_secs(1), Duration::from_millis(4)));
        let entry = logger.info("pong").outcome(&matched).into_entry();
        assert_eq!(entry.fields["outcome"], "matched");
        let rtt_ms = entry.fields["rtt_ms"].as_f64().unwrap();
        assert!((rtt_ms - 4.0).abs() < 1e-9);

        let mismatch = RoundTripOutcome::Mismatch(vec![0xF0, 0x7D, 0xF7]);
        let entry = logger.warn("mismatch").outcome(&mismatch).into_entry();
        assert_eq!(entry.fields["observed"], "f0 7d f7");

        let entry = logger.warn("timeout").outcome(&RoundTripOutcome::Timeout).into_entry();
        assert_eq!(entry.fields.len(), 1);
    }

    #[test]
    fn test_error_fields() {
        let logger = Logger::new("TEST");
        let error = AppError::listener("stream closed");
        let entry = logger.error("failed").error_info(&error).into_entry();
        assert_eq!(entry.fields["error_exit_code"], error.exit_code());
        assert_eq!(entry.fields["error_category"], error.category());
    }

    #[test]
    fn test_console_format() {
        let mut e = entry(LogLevel::Info, "Pinging Virtual Device");
        e.correlation_id = Some("test-id-123456".to_string());
        e.fields.insert("timeout_ms".to_string(), 2000.into());

        let logger = Logger { use_color: false, ..Logger::new("LOOP") };
        let line = logger.format_console(&e);
        assert!(line.contains(" INFO [LOOP] Pinging Virtual Device"));
        assert!(line.contains("[test-id-]"));
        assert!(line.ends_with("{timeout_ms=2000}"));
    }

    #[test]
    fn test_json_format_round_trips() {
        let logger = Logger::new("LOOP");
        let line = logger.format_json(&entry(LogLevel::Warn, "Timeout after 2000 ms"));

        let parsed: LogEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.level, LogLevel::Warn);
        assert_eq!(parsed.message, "Timeout after 2000 ms");
        assert_eq!(parsed.logger, "LOOP");
    }

    #[tokio::test]
    async fn test_logger_factory_shares_session() {
        let factory = LoggerFactory::new(Config::default());
        let first = factory.create_logger("APP").await;
        let second = factory.create_logger("SESSION").await;

        let first_id = first.context.read().await.session_id.clone();
        assert!(first_id.is_some());
        assert_eq!(first_id, second.context.read().await.session_id.clone());
    }
}
