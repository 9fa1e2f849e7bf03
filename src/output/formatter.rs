//! Core formatting traits and implementations
//!
//! This module defines the console formatting interface and provides a plain
//! text implementation. Iteration lines go to stdout one per ping.

use crate::{
    codec,
    executor::{IterationRecord, RunReport},
    models::RoundTripOutcome,
    stats::LatencyStatistics,
    types::{PortDirection, PortInfo},
};
use std::fmt::Write as _;

/// Main trait for console output formatting
pub trait IterationFormatter: Send {
    /// One line per resolved iteration, without trailing newline
    fn format_iteration(&self, record: &IterationRecord) -> String;

    /// Block printed after the run
    fn format_summary(&self, report: &RunReport, stats: &LatencyStatistics) -> String;

    /// Device listing for `--list`
    fn format_port_list(&self, ports: &[PortInfo]) -> String;

    /// Format error messages
    fn format_error(&self, error: &str) -> String;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> String;

    /// Format success messages
    fn format_success(&self, message: &str) -> String;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Enable verbose mode with percentiles and distribution
    pub verbose_mode: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
        }
    }
}

/// Send offset as printed at the start of each line
pub fn format_offset(offset_secs: f64) -> String {
    format!("{:.6}", offset_secs)
}

/// Round-trip time with millisecond precision
pub fn format_rtt(rtt_ms: f64) -> String {
    format!("{:.3}ms", rtt_ms)
}

/// Plain text formatter
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub(crate) fn outcome_text(outcome: &RoundTripOutcome) -> String {
        match outcome {
            RoundTripOutcome::Matched(sample) => format!("Pong! ({})", format_rtt(sample.rtt_ms())),
            RoundTripOutcome::Mismatch(bytes) => format!("Mismatch! {}", codec::to_hex(bytes)),
            RoundTripOutcome::Timeout => "Timeout".to_string(),
        }
    }

    pub(crate) fn port_section(ports: &[PortInfo], direction: PortDirection) -> Vec<String> {
        ports
            .iter()
            .filter(|port| port.direction == direction)
            .map(|port| format!("ID: {}\tName: {}", port.id, port.name))
            .collect()
    }
}

impl Default for PlainFormatter {
    fn default() -> Self {
        Self::new(FormattingOptions {
            enable_color: false,
            verbose_mode: false,
        })
    }
}

impl IterationFormatter for PlainFormatter {
    fn format_iteration(&self, record: &IterationRecord) -> String {
        format!(
            "{}: Ping? {}",
            format_offset(record.sent_at.as_secs_f64()),
            Self::outcome_text(&record.outcome)
        )
    }

    fn format_summary(&self, report: &RunReport, stats: &LatencyStatistics) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "--- ping-pong statistics ---");
        let _ = writeln!(
            output,
            "{} pings, {} pongs, {} mismatches, {} timeouts, {:.1}% success, {:.3}s elapsed",
            report.iterations,
            report.outcomes.matched,
            report.outcomes.mismatched,
            report.outcomes.timed_out,
            stats.success_rate,
            report.elapsed.as_secs_f64()
        );

        if stats.has_samples() {
            let _ = writeln!(
                output,
                "rtt min/avg/max/stddev = {:.3}/{:.3}/{:.3}/{:.3} ms, jitter {:.3} ms",
                stats.min_ms, stats.mean_ms, stats.max_ms, stats.std_dev_ms, stats.jitter_ms
            );
            if self.options.verbose_mode {
                let _ = writeln!(
                    output,
                    "p50/p90/p99 = {:.3}/{:.3}/{:.3} ms, {} outliers",
                    stats.p50_ms, stats.p90_ms, stats.p99_ms, stats.outlier_count
                );
                let d = &stats.distribution;
                let _ = writeln!(
                    output,
                    "excellent {:.1}%, good {:.1}%, fair {:.1}%, poor {:.1}%",
                    d.excellent_percentage, d.good_percentage, d.fair_percentage, d.poor_percentage
                );
            }
        } else {
            let _ = writeln!(output, "no round trips completed");
        }

        let _ = write!(output, "stopped: {}", report.stop_reason);
        output
    }

    fn format_port_list(&self, ports: &[PortInfo]) -> String {
        let mut output = String::from("Input Devices:\n");
        for line in Self::port_section(ports, PortDirection::Input) {
            output.push_str(&line);
            output.push('\n');
        }
        output.push_str("\nOutput Devices:\n");
        for line in Self::port_section(ports, PortDirection::Output) {
            output.push_str(&line);
            output.push('\n');
        }
        output
    }

    fn format_error(&self, error: &str) -> String {
        format!("ERROR: {}", error)
    }

    fn format_warning(&self, warning: &str) -> String {
        format!("WARNING: {}", warning)
    }

    fn format_success(&self, message: &str) -> String {
        format!("SUCCESS: {}", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::StopReason;
    use crate::models::{OutcomeCounts, Sample, SampleSeries};
    use std::time::Duration;

    fn record(index: u32, sent_ms: u64, outcome: RoundTripOutcome) -> IterationRecord {
        IterationRecord {
            index,
            sent_at: Duration::from_millis(sent_ms),
            outcome,
        }
    }

    fn report(series: SampleSeries, outcomes: OutcomeCounts) -> RunReport {
        RunReport {
            series,
            outcomes,
            history: Vec::new(),
            iterations: outcomes.total(),
            elapsed: Duration::from_millis(1500),
            stop_reason: StopReason::IterationsCompleted,
        }
    }

    #[test]
    fn test_iteration_lines() {
        let formatter = PlainFormatter::default();
        let sample = Sample::new(Duration::from_millis(20), Duration::from_micros(4250));

        assert_eq!(
            formatter.format_iteration(&record(0, 20, RoundTripOutcome::Matched(sample))),
            "0.020000: Ping? Pong! (4.250ms)"
        );
        assert_eq!(
            formatter.format_iteration(&record(1, 1500, RoundTripOutcome::Mismatch(vec![0xF0, 0x7D, 0xF7]))),
            "1.500000: Ping? Mismatch! f0 7d f7"
        );
        assert_eq!(
            formatter.format_iteration(&record(2, 3520, RoundTripOutcome::Timeout)),
            "3.520000: Ping? Timeout"
        );
    }

    #[test]
    fn test_summary_with_samples() {
        let series = SampleSeries::from_samples([
            Sample::new(Duration::ZERO, Duration::from_millis(2)),
            Sample::new(Duration::from_millis(30), Duration::from_millis(4)),
        ])
        .unwrap();
        let outcomes = OutcomeCounts { matched: 2, mismatched: 1, timed_out: 1 };
        let report = report(series, outcomes);
        let stats = report.statistics();

        let summary = PlainFormatter::default().format_summary(&report, &stats);
        assert!(summary.contains("4 pings, 2 pongs, 1 mismatches, 1 timeouts, 50.0% success"));
        assert!(summary.contains("rtt min/avg/max/stddev = 2.000/3.000/4.000/"));
        assert!(summary.ends_with("stopped: iteration count completed"));
        assert!(!summary.contains("p50"));

        let verbose = PlainFormatter::new(FormattingOptions { enable_color: false, verbose_mode: true });
        assert!(verbose.format_summary(&report, &stats).contains("p50/p90/p99"));
    }

    #[test]
    fn test_summary_without_samples() {
        let report = report(SampleSeries::new(), OutcomeCounts { matched: 0, mismatched: 0, timed_out: 3 });
        let summary = PlainFormatter::default().format_summary(&report, &report.statistics());
        assert!(summary.contains("no round trips completed"));
    }

    #[test]
    fn test_port_list() {
        let ports = vec![
            PortInfo { id: 0, name: "USB MIDI In".to_string(), direction: PortDirection::Input },
            PortInfo { id: 0, name: "USB MIDI Out".to_string(), direction: PortDirection::Output },
            PortInfo { id: 1, name: "Thru".to_string(), direction: PortDirection::Output },
        ];
        let listing = PlainFormatter::default().format_port_list(&ports);
        assert_eq!(
            listing,
            "Input Devices:\nID: 0\tName: USB MIDI In\n\nOutput Devices:\nID: 0\tName: USB MIDI Out\nID: 1\tName: Thru\n"
        );
    }
}
