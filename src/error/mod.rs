//! Error handling for the MIDI ping-pong tester
//!
//! Only conditions that end a run live here. A pong that does not match or
//! never arrives is an ordinary iteration outcome, see
//! [`RoundTripOutcome`](crate::models::RoundTripOutcome).

use thiserror::Error;

/// Custom error types for the MIDI ping-pong tester
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// A transport endpoint could not be opened
    #[error("Port open error: {0}")]
    PortOpen(String),

    /// Sending on an already open transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The background listener stopped delivering messages
    #[error("Listener error: {0}")]
    Listener(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Parsing errors (numbers, JSON, etc.)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// Graph or report rendering errors
    #[error("Render error: {0}")]
    Render(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new port open error
    pub fn port_open<S: Into<String>>(message: S) -> Self {
        Self::PortOpen(message.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new listener error
    pub fn listener<S: Into<String>>(message: S) -> Self {
        Self::Listener(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new render error
    pub fn render<S: Into<String>>(message: S) -> Self {
        Self::Render(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Validation(_) => "VALIDATION",
            Self::PortOpen(_) => "PORT",
            Self::Transport(_) => "TRANSPORT",
            Self::Listener(_) => "LISTENER",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Render(_) => "RENDER",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Check if running the command again could succeed without changes
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Listener(_) => true,
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) | Self::PortOpen(_) => false,
            Self::Io(_) | Self::Render(_) | Self::Internal(_) => false,
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Config(msg) => {
                format!("Configuration problem: {}\n\nSuggestion: Check your .env file or command line arguments.", msg)
            }
            Self::Validation(msg) => {
                format!("Invalid input: {}\n\nSuggestion: Run with --help to see the accepted ranges.", msg)
            }
            Self::PortOpen(msg) => {
                format!("Could not open MIDI port: {}\n\nSuggestion: Run with --list to see the available device IDs.", msg)
            }
            Self::Transport(msg) => {
                format!("MIDI link failure: {}\n\nSuggestion: Check the cable or interface and try again.", msg)
            }
            Self::Listener(msg) => {
                format!("MIDI input stopped: {}\n\nSuggestion: The input device may have been unplugged. Reconnect it and rerun.", msg)
            }
            Self::Io(msg) => {
                format!("File operation failed: {}\n\nSuggestion: Check file permissions and disk space.", msg)
            }
            Self::Parse(msg) => {
                format!("Failed to parse data: {}\n\nSuggestion: Check the format of your input data or configuration files.", msg)
            }
            Self::Render(msg) => {
                format!("Could not write results: {}\n\nSuggestion: Check the --graph-filename and --json paths.", msg)
            }
            Self::Internal(msg) => {
                format!("Internal error: {}\n\nThis is likely a bug. Please report this issue with the error details.", msg)
            }
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,  // Invalid configuration/usage
            Self::PortOpen(_) => 2,
            Self::Transport(_) | Self::Listener(_) => 3,  // Link went down mid-run
            Self::Io(_) | Self::Render(_) => 5,
            Self::Internal(_) => 99,  // Internal/unexpected errors
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Validation(_) | Self::Parse(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::PortOpen(_) | Self::Transport(_) | Self::Listener(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::Io(_) | Self::Render(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

// Standard library error conversions
impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON error: {}", error))
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::internal(format!("Background task failed: {}", error))
    }
}

// Anyhow integration
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(format!("{:#}", error))
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Error context trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error, keeping its category
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ErrorContext<T> for Result<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|error| {
            let context = f();
            match error {
                AppError::Config(msg) => AppError::Config(format!("{}: {}", context, msg)),
                AppError::Validation(msg) => AppError::Validation(format!("{}: {}", context, msg)),
                AppError::PortOpen(msg) => AppError::PortOpen(format!("{}: {}", context, msg)),
                AppError::Transport(msg) => AppError::Transport(format!("{}: {}", context, msg)),
                AppError::Listener(msg) => AppError::Listener(format!("{}: {}", context, msg)),
                AppError::Io(msg) => AppError::Io(format!("{}: {}", context, msg)),
                AppError::Parse(msg) => AppError::Parse(format!("{}: {}", context, msg)),
                AppError::Render(msg) => AppError::Render(format!("{}: {}", context, msg)),
                AppError::Internal(msg) => AppError::Internal(format!("{}: {}", context, msg)),
            }
        })
    }
}

/// Error reporter for user feedback on stderr
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    /// Create a new error reporter
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Report an error to the user
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", error.format_for_console(self.use_color));

        if self.verbose {
            eprintln!();
            eprintln!("{}", error.user_friendly_message());

            if error.is_recoverable() {
                eprintln!();
                if self.use_color {
                    use colored::Colorize;
                    eprintln!("{}", "This error might be temporary. You can try running the command again.".green());
                } else {
                    eprintln!("This error might be temporary. You can try running the command again.");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_error = AppError::config("Invalid configuration");
        assert_eq!(config_error.category(), "CONFIG");
        assert!(!config_error.is_recoverable());
        assert_eq!(config_error.exit_code(), 1);

        let transport_error = AppError::transport("Write failed");
        assert_eq!(transport_error.category(), "TRANSPORT");
        assert!(transport_error.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let error = AppError::port_open("no input with id 7");
        let display = error.to_string();
        assert!(display.contains("Port open error"));
        assert!(display.contains("no input with id 7"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(AppError::config("test").exit_code(), 1);
        assert_eq!(AppError::port_open("test").exit_code(), 2);
        assert_eq!(AppError::transport("test").exit_code(), 3);
        assert_eq!(AppError::listener("test").exit_code(), 3);
        assert_eq!(AppError::render("test").exit_code(), 5);
        assert_eq!(AppError::internal("test").exit_code(), 99);
    }

    #[test]
    fn test_user_friendly_messages() {
        let error = AppError::port_open("output 3 out of range");
        let message = error.user_friendly_message();
        assert!(message.contains("--list"));
        assert!(message.contains("output 3 out of range"));
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let app_error: AppError = io_error.into();
        assert_eq!(app_error.category(), "IO");

        let parse_error = "abc".parse::<u32>().unwrap_err();
        let app_error: AppError = parse_error.into();
        assert_eq!(app_error.category(), "PARSE");
    }

    #[test]
    fn test_context_keeps_category() {
        let result: Result<()> = Err(AppError::port_open("busy"));
        let error = result.with_context(|| "opening input 2".to_string()).unwrap_err();
        assert_eq!(error.category(), "PORT");
        assert!(error.to_string().contains("opening input 2: busy"));
    }

    #[test]
    fn test_console_format_without_color() {
        let error = AppError::listener("stream ended");
        assert_eq!(
            error.format_for_console(false),
            "[LISTENER] Listener error: stream ended"
        );
    }

    #[test]
    fn test_anyhow_integration() {
        let app_error: AppError = anyhow::anyhow!("backend refused").into();
        assert_eq!(app_error.category(), "INTERNAL");

        let wrapped = anyhow::anyhow!(AppError::render("disk full"));
        assert!(wrapped.to_string().contains("disk full"));
    }
}
