//! Data models and structures for the MIDI ping-pong tester

pub mod config;
pub mod metrics;

// Re-export main model types
pub use config::Config;
pub use metrics::{OutcomeCounts, RoundTripOutcome, Sample, SampleSeries};
