//! MIDI Ping-Pong
//!
//! Measures the round-trip latency of a SysEx request/response exchange with
//! a MIDI device. Each iteration sends a fixed ping, waits for the matching
//! pong under a deadline and records a `(send offset, round-trip time)`
//! sample. The collected series can be rendered as a graph or JSON report.

pub mod cli;
pub mod codec;
pub mod config;
pub mod correlator;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod session;
pub mod stats;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Config, OutcomeCounts, RoundTripOutcome, Sample, SampleSeries};
pub use executor::{LoopConfig, RoundTripLoop, RunLimit, RunReport, StopReason};
pub use session::Session;
pub use stats::LatencyStatistics;
pub use types::Endpoints;

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Deadline for a pong after each ping
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
    /// Pause between iterations
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(20);
    /// Wall-clock length of a duration-bounded run
    pub const DEFAULT_TEST_DURATION: Duration = Duration::from_secs(30);
    /// 0 disables the iteration limit
    pub const DEFAULT_COUNT: u32 = 0;
    pub const DEFAULT_GRAPH_TITLE: &str = "MIDI Ping-Pong Latency";
    pub const DEFAULT_GRAPH_FILENAME: &str = "results/output.svg";
    pub const DEFAULT_ENABLE_COLOR: bool = true;
    /// Client name announced to the MIDI driver
    pub const CLIENT_NAME: &str = "midi-ping-pong";
}
