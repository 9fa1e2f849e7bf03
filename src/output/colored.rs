//! Colored formatter implementation with terminal color support

use crate::{
    executor::{IterationRecord, RunReport},
    models::RoundTripOutcome,
    stats::LatencyStatistics,
    types::{LatencyLevel, PortDirection, PortInfo},
};
use super::formatter::{format_offset, format_rtt, FormattingOptions, IterationFormatter, PlainFormatter};
use colored::*;
use std::fmt::Write as _;

/// Color for each latency level
pub fn latency_color(level: LatencyLevel) -> Color {
    match level {
        LatencyLevel::Excellent => Color::Green,
        LatencyLevel::Good => Color::Cyan,
        LatencyLevel::Fair => Color::Yellow,
        LatencyLevel::Poor => Color::Red,
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        let plain_formatter = PlainFormatter::new(options.clone());
        Self {
            plain_formatter,
            options,
            color_scheme: ColorScheme::default(),
        }
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        let plain_formatter = PlainFormatter::new(options.clone());
        Self {
            plain_formatter,
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    /// Apply bold formatting if colors are enabled
    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn dimmed(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.dimmed()
        } else {
            text.normal()
        }
    }

    /// Format a percentage with color coding based on value
    fn format_percentage_colored(&self, percentage: f64) -> ColoredString {
        let formatted = format!("{:.1}%", percentage);
        let color = if percentage >= 95.0 {
            self.color_scheme.success
        } else if percentage >= 80.0 {
            self.color_scheme.warning
        } else {
            self.color_scheme.error
        };
        self.colorize(&formatted, color)
    }

    fn format_rtt_colored(&self, rtt_ms: f64) -> ColoredString {
        self.colorize(&format_rtt(rtt_ms), latency_color(LatencyLevel::from_rtt_ms(rtt_ms)))
    }
}

impl IterationFormatter for ColoredFormatter {
    fn format_iteration(&self, record: &IterationRecord) -> String {
        let offset = self.dimmed(&format_offset(record.sent_at.as_secs_f64()));
        let outcome = match &record.outcome {
            RoundTripOutcome::Matched(sample) => format!(
                "{} ({})",
                self.colorize("Pong!", self.color_scheme.success),
                self.format_rtt_colored(sample.rtt_ms())
            ),
            RoundTripOutcome::Mismatch(_) => self
                .colorize(&PlainFormatter::outcome_text(&record.outcome), self.color_scheme.warning)
                .to_string(),
            RoundTripOutcome::Timeout => self.colorize("Timeout", self.color_scheme.error).to_string(),
        };
        format!("{}: Ping? {}", offset, outcome)
    }

    fn format_summary(&self, report: &RunReport, stats: &LatencyStatistics) -> String {
        if !self.options.enable_color {
            return self.plain_formatter.format_summary(report, stats);
        }

        let mut output = String::new();
        let _ = writeln!(output, "{}", self.colorize("--- ping-pong statistics ---", self.color_scheme.header).bold());
        let _ = writeln!(
            output,
            "{} pings, {} pongs, {} mismatches, {} timeouts, {} success, {:.3}s elapsed",
            self.bold(&report.iterations.to_string()),
            self.colorize(&report.outcomes.matched.to_string(), self.color_scheme.success),
            self.colorize(&report.outcomes.mismatched.to_string(), self.color_scheme.warning),
            self.colorize(&report.outcomes.timed_out.to_string(), self.color_scheme.error),
            self.format_percentage_colored(stats.success_rate),
            report.elapsed.as_secs_f64()
        );

        if let Some(level) = stats.latency_level() {
            let _ = writeln!(
                output,
                "rtt min/avg/max/stddev = {:.3}/{}/{:.3}/{:.3} ms, jitter {:.3} ms ({})",
                stats.min_ms,
                self.colorize(&format!("{:.3}", stats.mean_ms), latency_color(level)).bold(),
                stats.max_ms,
                stats.std_dev_ms,
                stats.jitter_ms,
                self.colorize(level.description(), latency_color(level))
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
                    "{} {:.1}%, {} {:.1}%, {} {:.1}%, {} {:.1}%",
                    self.colorize("excellent", latency_color(LatencyLevel::Excellent)),
                    d.excellent_percentage,
                    self.colorize("good", latency_color(LatencyLevel::Good)),
                    d.good_percentage,
                    self.colorize("fair", latency_color(LatencyLevel::Fair)),
                    d.fair_percentage,
                    self.colorize("poor", latency_color(LatencyLevel::Poor)),
                    d.poor_percentage
                );
            }
        } else {
            let _ = writeln!(output, "{}", self.colorize("no round trips completed", self.color_scheme.error));
        }

        let stop_color = if report.stop_reason.is_clean() {
            self.color_scheme.muted
        } else {
            self.color_scheme.error
        };
        let _ = write!(output, "{}", self.colorize(&format!("stopped: {}", report.stop_reason), stop_color));
        output
    }

    fn format_port_list(&self, ports: &[PortInfo]) -> String {
        let mut output = format!("{}\n", self.colorize("Input Devices:", self.color_scheme.header).bold());
        for line in PlainFormatter::port_section(ports, PortDirection::Input) {
            let _ = writeln!(output, "{}", line);
        }
        let _ = writeln!(output, "\n{}", self.colorize("Output Devices:", self.color_scheme.header).bold());
        for line in PlainFormatter::port_section(ports, PortDirection::Output) {
            let _ = writeln!(output, "{}", line);
        }
        output
    }

    fn format_error(&self, error: &str) -> String {
        format!("{} {}", self.colorize("✗", self.color_scheme.error), self.colorize(error, self.color_scheme.error))
    }

    fn format_warning(&self, warning: &str) -> String {
        format!("{} {}", self.colorize("⚠", self.color_scheme.warning), warning)
    }

    fn format_success(&self, message: &str) -> String {
        format!("{} {}", self.colorize("✓", self.color_scheme.success), message)
    }
}
