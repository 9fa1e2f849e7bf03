//! Round-trip samples and per-iteration outcomes

use crate::error::{AppError, Result};
use crate::types::LatencyLevel;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One successful round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// When the ping was sent, measured from session start
    pub offset: Duration,

    /// Time from sending the ping to receiving the matching pong
    pub rtt: Duration,
}

impl Sample {
    pub fn new(offset: Duration, rtt: Duration) -> Self {
        Self { offset, rtt }
    }

    /// Send offset in seconds (graph x axis)
    pub fn offset_secs(&self) -> f64 {
        self.offset.as_secs_f64()
    }

    /// Round-trip time in milliseconds (graph y axis)
    pub fn rtt_ms(&self) -> f64 {
        self.rtt.as_secs_f64() * 1000.0
    }

    pub fn latency_level(&self) -> LatencyLevel {
        LatencyLevel::from_rtt_ms(self.rtt_ms())
    }
}

/// Append-only, send-ordered collection of samples
///
/// Offsets never decrease from one sample to the next. There is no way to
/// remove or modify a sample once appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleSeries {
    samples: Vec<Sample>,
}

impl SampleSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from samples that are already in send order
    pub fn from_samples<I>(samples: I) -> Result<Self>
    where
        I: IntoIterator<Item = Sample>,
    {
        let mut series = Self::new();
        for sample in samples {
            series.push(sample)?;
        }
        Ok(series)
    }

    /// Append a sample; rejects one sent before the current last sample
    pub fn push(&mut self, sample: Sample) -> Result<()> {
        if let Some(last) = self.samples.last() {
            if sample.offset < last.offset {
                return Err(AppError::validation(format!(
                    "sample offset {:?} precedes previous offset {:?}",
                    sample.offset, last.offset
                )));
            }
        }
        self.samples.push(sample);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// X values for plotting
    pub fn offsets_secs(&self) -> Vec<f64> {
        self.samples.iter().map(Sample::offset_secs).collect()
    }

    /// Y values for plotting
    pub fn rtts_ms(&self) -> Vec<f64> {
        self.samples.iter().map(Sample::rtt_ms).collect()
    }
}

impl<'a> IntoIterator for &'a SampleSeries {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Result of a single loop iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RoundTripOutcome {
    /// The canonical pong arrived before the deadline
    Matched(Sample),
    /// A SysEx frame arrived but its bytes differ from the pong
    Mismatch(Vec<u8>),
    /// Nothing arrived before the deadline
    Timeout,
}

impl RoundTripOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    pub fn sample(&self) -> Option<&Sample> {
        match self {
            Self::Matched(sample) => Some(sample),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Matched(_) => "matched",
            Self::Mismatch(_) => "mismatch",
            Self::Timeout => "timeout",
        }
    }
}

/// Tally of iteration outcomes, kept separate per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub matched: u32,
    pub mismatched: u32,
    pub timed_out: u32,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: &RoundTripOutcome) {
        match outcome {
            RoundTripOutcome::Matched(_) => self.matched += 1,
            RoundTripOutcome::Mismatch(_) => self.mismatched += 1,
            RoundTripOutcome::Timeout => self.timed_out += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.matched + self.mismatched + self.timed_out
    }

    /// Matched iterations as a percentage of all iterations
    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.matched as f64 / total as f64) * 100.0
        }
    }
}
