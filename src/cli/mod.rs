//! Command-line interface module with topic help

pub mod help;

pub use help::HelpSystem;

use clap::Parser;

/// MIDI Ping-Pong - measure SysEx round-trip latency to a MIDI device
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "ping-pong")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Input device ID (where pongs arrive, see --list)
    #[arg(long = "in", value_name = "ID")]
    pub input: Option<usize>,

    /// Output device ID (where pings are sent, see --list)
    #[arg(long = "out", value_name = "ID")]
    pub output: Option<usize>,

    /// List MIDI devices and exit
    #[arg(long)]
    pub list: bool,

    /// Number of ping-pongs to perform (0 for no count limit)
    #[arg(short, long, value_name = "N")]
    pub count: Option<u32>,

    /// Test length in seconds (0 for no duration limit)
    #[arg(short, long, value_name = "SECS")]
    pub duration: Option<u64>,

    /// Pong deadline in milliseconds
    #[arg(long, value_name = "MS", value_parser = parse_timeout_ms)]
    pub timeout_ms: Option<u64>,

    /// Pause between iterations in milliseconds
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Graph title
    #[arg(long, value_name = "TITLE")]
    pub graph_title: Option<String>,

    /// Graph output file (SVG)
    #[arg(long, value_name = "PATH")]
    pub graph_filename: Option<String>,

    /// Also write a JSON report to PATH
    #[arg(long = "json", value_name = "PATH")]
    pub json: Option<String>,

    /// Run against the built-in virtual device instead of real ports
    #[arg(long)]
    pub loopback: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Show help for specific topic (config, examples, timing, output)
    #[arg(long, value_name = "TOPIC")]
    pub help_topic: Option<String>,
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.list || self.help_topic.is_some() {
            return Ok(());
        }

        if self.count == Some(0) && self.duration == Some(0) {
            return Err("--count 0 and --duration 0 together would never stop".to_string());
        }

        if !self.loopback && self.input.is_some() != self.output.is_some() {
            return Err("--in and --out must be given together".to_string());
        }

        Ok(())
    }

    /// Check if help should be displayed for a specific topic
    pub fn should_show_topic_help(&self) -> bool {
        self.help_topic.is_some()
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }

    /// Display help for the specified topic or main help
    pub fn display_help(&self) -> String {
        let help_system = HelpSystem::new();
        let use_colors = self.use_colors();

        if let Some(topic) = &self.help_topic {
            help_system.display_topic_help(topic, use_colors)
                .unwrap_or_else(|| {
                    format!("Unknown help topic: '{}'\n\nAvailable topics: {}\n\n{}",
                        topic, help::TOPICS.join(", "), help_system.display_main_help(use_colors))
                })
        } else {
            help_system.display_main_help(use_colors)
        }
    }
}

/// Parse the pong deadline in milliseconds
fn parse_timeout_ms(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid timeout: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid timeout: {}", s))
        .and_then(|ms| {
            if ms == 0 {
                Err("Timeout must be greater than 0".to_string())
            } else if ms > 60_000 {
                Err("Timeout cannot exceed 60000 ms".to_string())
            } else {
                Ok(ms)
            }
        })
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
