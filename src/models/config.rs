//! Configuration data model and validation

use crate::executor::{LoopConfig, RunLimit};
use crate::types::{AppError, Endpoints, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for the pong deadline
const MAX_TIMEOUT_MS: u64 = 60_000;

/// Upper bound for the pause between iterations
const MAX_INTERVAL_MS: u64 = 10_000;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Input device index (pongs arrive here)
    #[serde(default)]
    pub input_port: Option<usize>,

    /// Output device index (pings are sent here)
    #[serde(default)]
    pub output_port: Option<usize>,

    /// Number of iterations, 0 for no iteration limit
    #[serde(default = "default_count")]
    pub count: u32,

    /// Test length in seconds, 0 for no duration limit
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    /// Pong deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Pause between iterations in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Graph title
    #[serde(default)]
    pub graph_title: Option<String>,

    /// Graph output path
    #[serde(default = "default_graph_filename")]
    pub graph_filename: String,

    /// Optional JSON report path
    #[serde(default)]
    pub json_report: Option<String>,

    /// Run against the in-process virtual responder instead of devices
    #[serde(default)]
    pub loopback: bool,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_port: None,
            output_port: None,
            count: default_count(),
            duration_secs: default_duration_secs(),
            timeout_ms: default_timeout_ms(),
            interval_ms: default_interval_ms(),
            graph_title: None,
            graph_filename: default_graph_filename(),
            json_report: None,
            loopback: false,
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get inter-iteration pause as Duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Stop condition derived from `count` and `duration_secs`
    pub fn run_limit(&self) -> RunLimit {
        RunLimit {
            max_duration: (self.duration_secs > 0).then(|| Duration::from_secs(self.duration_secs)),
            max_iterations: (self.count > 0).then_some(self.count),
        }
    }

    /// Loop parameters for a session
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            timeout: self.timeout(),
            interval: self.interval(),
            limit: self.run_limit(),
        }
    }

    /// Device indices; both must be set unless running in loopback mode
    pub fn endpoints(&self) -> Result<Endpoints> {
        if self.loopback {
            return Ok(Endpoints::new(
                self.input_port.unwrap_or(0),
                self.output_port.unwrap_or(0),
            ));
        }
        match (self.input_port, self.output_port) {
            (Some(input), Some(output)) => Ok(Endpoints::new(input, output)),
            _ => Err(AppError::config("Both --in and --out device IDs are required (see --list)")),
        }
    }

    /// Title used when none was given
    pub fn effective_graph_title(&self) -> &str {
        self.graph_title
            .as_deref()
            .filter(|title| !title.is_empty())
            .unwrap_or(crate::defaults::DEFAULT_GRAPH_TITLE)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(AppError::config("Timeout must be greater than 0"));
        }

        if self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(AppError::config(format!("Timeout cannot exceed {} ms", MAX_TIMEOUT_MS)));
        }

        if self.interval_ms > MAX_INTERVAL_MS {
            return Err(AppError::config(format!("Interval cannot exceed {} ms", MAX_INTERVAL_MS)));
        }

        if self.count == 0 && self.duration_secs == 0 {
            return Err(AppError::config(
                "At least one of count or duration must be non-zero, otherwise the run never stops",
            ));
        }

        if self.graph_filename.trim().is_empty() {
            return Err(AppError::config("Graph filename cannot be empty"));
        }

        if let Some(path) = &self.json_report {
            if path.trim().is_empty() {
                return Err(AppError::config("JSON report path cannot be empty"));
            }
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(input) = std::env::var("PING_PONG_IN") {
            self.input_port = Some(input.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PING_PONG_IN value '{}': {}", input, e)))?);
        }

        if let Ok(output) = std::env::var("PING_PONG_OUT") {
            self.output_port = Some(output.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PING_PONG_OUT value '{}': {}", output, e)))?);
        }

        if let Ok(count) = std::env::var("PING_PONG_COUNT") {
            self.count = count.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PING_PONG_COUNT value '{}': {}", count, e)))?;
        }

        if let Ok(duration) = std::env::var("PING_PONG_DURATION_SECS") {
            self.duration_secs = duration.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PING_PONG_DURATION_SECS value '{}': {}", duration, e)))?;
        }

        if let Ok(timeout) = std::env::var("PING_PONG_TIMEOUT_MS") {
            self.timeout_ms = timeout.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PING_PONG_TIMEOUT_MS value '{}': {}", timeout, e)))?;
        }

        if let Ok(interval) = std::env::var("PING_PONG_INTERVAL_MS") {
            self.interval_ms = interval.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PING_PONG_INTERVAL_MS value '{}': {}", interval, e)))?;
        }

        if let Ok(filename) = std::env::var("PING_PONG_GRAPH_FILENAME") {
            self.graph_filename = filename.trim().to_string();
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_count() -> u32 {
    crate::defaults::DEFAULT_COUNT
}

fn default_duration_secs() -> u64 {
    crate::defaults::DEFAULT_TEST_DURATION.as_secs()
}

fn default_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_interval_ms() -> u64 {
    crate::defaults::DEFAULT_INTERVAL.as_millis() as u64
}

fn default_graph_filename() -> String {
    crate::defaults::DEFAULT_GRAPH_FILENAME.to_string()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}
