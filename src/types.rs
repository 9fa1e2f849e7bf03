//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Pair of device indices selecting where pings go out and pongs come in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Input port index (pongs arrive here)
    pub input: usize,
    /// Output port index (pings are sent here)
    pub output: usize,
}

impl Endpoints {
    pub fn new(input: usize, output: usize) -> Self {
        Self { input, output }
    }
}

/// Direction of a transport port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => f.write_str("input"),
            PortDirection::Output => f.write_str("output"),
        }
    }
}

/// One enumerated device port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    pub id: usize,
    pub name: String,
    pub direction: PortDirection,
}

/// Round-trip latency classification used for color coding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyLevel {
    /// Below 5 ms, about what a direct USB-MIDI loop does
    Excellent,
    /// 5-20 ms
    Good,
    /// 20-50 ms
    Fair,
    /// 50 ms and above
    Poor,
}

impl LatencyLevel {
    pub fn from_rtt_ms(rtt_ms: f64) -> Self {
        if rtt_ms < 5.0 {
            Self::Excellent
        } else if rtt_ms < 20.0 {
            Self::Good
        } else if rtt_ms < 50.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_level_boundaries() {
        assert_eq!(LatencyLevel::from_rtt_ms(0.4), LatencyLevel::Excellent);
        assert_eq!(LatencyLevel::from_rtt_ms(5.0), LatencyLevel::Good);
        assert_eq!(LatencyLevel::from_rtt_ms(20.0), LatencyLevel::Fair);
        assert_eq!(LatencyLevel::from_rtt_ms(50.0), LatencyLevel::Poor);
    }

    #[test]
    fn test_port_direction_display() {
        assert_eq!(PortDirection::Input.to_string(), "input");
        assert_eq!(PortDirection::Output.to_string(), "output");
    }
}
