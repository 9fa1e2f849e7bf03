//! Topic help with usage examples and configuration guidance

use crate::config::env::EnvManager;
use colored::*;

/// Topics accepted by `--help-topic`
pub const TOPICS: &[&str] = &["config", "examples", "timing", "output"];

/// Help text for the CLI application
pub struct HelpSystem {
    binary: &'static str,
}

impl HelpSystem {
    pub fn new() -> Self {
        Self { binary: "ping-pong" }
    }

    /// Display the main help message
    pub fn display_main_help(&self, use_colors: bool) -> String {
        let mut help = String::new();

        help.push_str(&self.format_header(use_colors));
        help.push('\n');
        help.push_str(&self.format_usage_section(use_colors));
        help.push('\n');
        help.push_str(&self.format_examples_section(use_colors));
        help.push('\n');
        help.push_str(&self.format_environment_section(use_colors));

        help
    }

    /// Display quick help for specific topics
    pub fn display_topic_help(&self, topic: &str, use_colors: bool) -> Option<String> {
        match topic.to_lowercase().as_str() {
            "config" | "configuration" | "env" | "environment" => Some(self.format_environment_section(use_colors)),
            "examples" => Some(self.format_examples_section(use_colors)),
            "timing" | "timeout" | "timeouts" => Some(self.format_timing_help(use_colors)),
            "output" | "graph" => Some(self.format_output_help(use_colors)),
            _ => None,
        }
    }

    fn heading(&self, text: &str, use_colors: bool) -> String {
        if use_colors {
            text.bright_green().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn command(&self, text: &str, use_colors: bool) -> String {
        if use_colors {
            text.bright_white().to_string()
        } else {
            text.to_string()
        }
    }

    fn format_header(&self, use_colors: bool) -> String {
        let title = "MIDI Ping-Pong";
        let subtitle = "SysEx round-trip latency tester";
        let version = env!("CARGO_PKG_VERSION");

        if use_colors {
            format!("{}\n{}\nVersion: {}\n", title.bright_cyan().bold(), subtitle.bright_blue(), version.green())
        } else {
            format!("{}\n{}\nVersion: {}\n", title, subtitle, version)
        }
    }

    fn format_usage_section(&self, use_colors: bool) -> String {
        let patterns = [
            format!("{} --list", self.binary),
            format!("{} --in <ID> --out <ID> [OPTIONS]", self.binary),
            format!("{} --loopback [OPTIONS]", self.binary),
            format!("{} --help-topic <TOPIC>", self.binary),
        ];

        let mut usage = format!("{}\n", self.heading("USAGE:", use_colors));
        for pattern in &patterns {
            usage.push_str(&format!("  {}\n", self.command(pattern, use_colors)));
        }
        usage
    }

    fn format_examples_section(&self, use_colors: bool) -> String {
        let examples = [
            ("Find device IDs", format!("{} --list", self.binary)),
            ("Run for 30 seconds (default)", format!("{} --in 1 --out 1", self.binary)),
            ("Exactly 100 round trips", format!("{} --in 1 --out 1 --count 100", self.binary)),
            ("Slow remote, relaxed deadline", format!("{} --in 1 --out 1 --timeout-ms 5000", self.binary)),
            ("Titled graph and JSON report", format!(
                "{} --in 1 --out 1 --graph-title \"USB cable\" --graph-filename results/usb.svg --json results/usb.json",
                self.binary
            )),
            ("Self-test without hardware", format!("{} --loopback --count 10", self.binary)),
        ];

        let mut output = format!("{}\n", self.heading("EXAMPLES:", use_colors));
        for (description, command) in &examples {
            output.push_str(&format!("  # {}\n  {}\n\n", description, self.command(command, use_colors)));
        }
        output
    }

    fn format_environment_section(&self, use_colors: bool) -> String {
        let mut output = format!("{}\n", self.heading("ENVIRONMENT VARIABLES:", use_colors));
        output.push_str("Configuration priority: CLI arguments > Environment variables > .env file > Defaults\n\n");

        for (var_name, description, _example) in EnvManager::get_supported_env_vars() {
            if use_colors {
                output.push_str(&format!("  {}: {}\n", var_name.bright_yellow().bold(), description));
            } else {
                output.push_str(&format!("  {}: {}\n", var_name, description));
            }
        }
        output
    }

    fn format_timing_help(&self, use_colors: bool) -> String {
        let mut output = format!("{}\n", self.heading("TIMING:", use_colors));
        output.push_str("  Each iteration sends one ping and waits for the pong before sending the next.\n\n");
        output.push_str("  --timeout-ms <MS>   deadline for the pong (default 2000). A missed deadline is\n");
        output.push_str("                      reported as Timeout and the run continues.\n");
        output.push_str("  --interval-ms <MS>  pause after every outcome (default 20).\n");
        output.push_str("  --count <N>         stop after N iterations; pongs, mismatches and timeouts all count.\n");
        output.push_str("  --duration <SECS>   stop once SECS have elapsed (default 30).\n\n");
        output.push_str("  With both limits set the first one reached ends the run. Giving only --count\n");
        output.push_str("  drops the default duration limit.\n");
        output
    }

    fn format_output_help(&self, use_colors: bool) -> String {
        let mut output = format!("{}\n", self.heading("OUTPUT:", use_colors));
        output.push_str("  stdout carries one line per iteration:\n");
        output.push_str("    0.020113: Ping? Pong! (3.412ms)\n");
        output.push_str("    2.041007: Ping? Mismatch! f0 7d 01 f7\n");
        output.push_str("    4.061550: Ping? Timeout\n\n");
        output.push_str("  After the run a summary is printed and the graph is written to\n");
        output.push_str("  --graph-filename (default results/output.svg). Logs go to stderr.\n");
        output.push_str("  Exit status is non-zero if the input stream closed during the run.\n");
        output
    }
}

impl Default for HelpSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_help_display() {
        let help = HelpSystem::new().display_main_help(false);
        assert!(help.contains("MIDI Ping-Pong"));
        assert!(help.contains("USAGE:"));
        assert!(help.contains("--loopback"));
        assert!(help.contains("PING_PONG_TIMEOUT_MS"));
    }

    #[test]
    fn test_every_topic_resolves() {
        let help = HelpSystem::new();
        for topic in TOPICS {
            assert!(help.display_topic_help(topic, false).is_some(), "topic {topic}");
        }
        assert!(help.display_topic_help("TIMING", false).is_some());
        assert!(help.display_topic_help("nonexistent", false).is_none());
    }

    #[test]
    fn test_color_formatting_differences() {
        colored::control::set_override(true);
        let help = HelpSystem::new();
        let plain = help.display_main_help(false);
        let colored = help.display_main_help(true);
        assert_ne!(plain, colored);
        assert!(!plain.contains("\x1b["));
        colored::control::unset_override();
    }
}
