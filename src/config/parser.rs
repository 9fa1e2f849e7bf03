//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::Result,
    models::Config,
};

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug)?;
        config.merge_from_env()?;

        self.apply_cli_overrides(&mut config);

        if !self.cli.list {
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    pub fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        if let Some(input) = cli.input {
            config.input_port = Some(input);
        }
        if let Some(output) = cli.output {
            config.output_port = Some(output);
        }

        if let Some(count) = cli.count {
            config.count = count;
            // A bare --count asks for a count-bounded run.
            if count > 0 && cli.duration.is_none() && !EnvManager::is_set("PING_PONG_DURATION_SECS") {
                config.duration_secs = 0;
            }
        }
        if let Some(duration) = cli.duration {
            config.duration_secs = duration;
        }

        if let Some(timeout_ms) = cli.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(interval_ms) = cli.interval_ms {
            config.interval_ms = interval_ms;
        }

        if let Some(ref title) = cli.graph_title {
            config.graph_title = Some(title.clone());
        }
        if let Some(ref filename) = cli.graph_filename {
            config.graph_filename = filename.clone();
        }
        if let Some(ref json) = cli.json {
            config.json_report = Some(json.clone());
        }

        if cli.color {
            config.enable_color = true;
        } else if cli.no_color {
            config.enable_color = false;
        }

        // CLI-only flags
        config.loopback = cli.loopback;
        config.verbose = cli.verbose;
        config.debug = cli.debug;
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let port = |id: Option<usize>| id.map_or_else(|| "-".to_string(), |id| id.to_string());
    let limit = |value: u64, unit: &str| {
        if value == 0 {
            "none".to_string()
        } else {
            format!("{}{}", value, unit)
        }
    };

    let mut summary = Vec::new();
    summary.push(format!("Input: {}", port(config.input_port)));
    summary.push(format!("Output: {}", port(config.output_port)));
    summary.push(format!("Count limit: {}", limit(u64::from(config.count), "")));
    summary.push(format!("Duration limit: {}", limit(config.duration_secs, "s")));
    summary.push(format!("Timeout: {}ms", config.timeout_ms));
    summary.push(format!("Interval: {}ms", config.interval_ms));
    summary.push(format!("Graph: {} ({})", config.graph_filename, config.effective_graph_title()));
    if let Some(ref json) = config.json_report {
        summary.push(format!("JSON report: {}", json));
    }
    summary.push(format!("Loopback: {}", config.loopback));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::time::Duration;

    fn overridden(args: &[&str]) -> Config {
        let mut argv = vec!["ping-pong"];
        argv.extend_from_slice(args);
        let mut config = Config::default();
        ConfigParser::new(Cli::parse_from(argv)).apply_cli_overrides(&mut config);
        config
    }

    #[test]
    fn test_defaults_without_overrides() {
        let config = overridden(&[]);
        assert_eq!(config.count, crate::defaults::DEFAULT_COUNT);
        assert_eq!(config.duration_secs, 30);
        assert_eq!(config.enable_color, crate::defaults::DEFAULT_ENABLE_COLOR);
        assert!(!config.loopback);
    }

    #[test]
    fn test_port_and_timing_overrides() {
        let config = overridden(&["--in", "2", "--out", "3", "--timeout-ms", "750", "--interval-ms", "5"]);
        assert_eq!(config.input_port, Some(2));
        assert_eq!(config.output_port, Some(3));
        assert_eq!(config.timeout(), Duration::from_millis(750));
        assert_eq!(config.interval(), Duration::from_millis(5));
    }

    #[test]
    fn test_count_alone_is_count_bounded() {
        let config = overridden(&["--count", "5"]);
        assert_eq!(config.run_limit().max_iterations, Some(5));
        assert_eq!(config.run_limit().max_duration, None);
    }

    #[test]
    fn test_count_and_duration_together() {
        let config = overridden(&["--count", "5", "--duration", "10"]);
        assert_eq!(config.run_limit().max_iterations, Some(5));
        assert_eq!(config.run_limit().max_duration, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_output_overrides() {
        let config = overridden(&["--graph-title", "Loop", "--graph-filename", "a/b.svg", "--json", "a/b.json", "--no-color"]);
        assert_eq!(config.effective_graph_title(), "Loop");
        assert_eq!(config.graph_filename, "a/b.svg");
        assert_eq!(config.json_report.as_deref(), Some("a/b.json"));
        assert!(!config.enable_color);
    }

    #[test]
    fn test_list_skips_validation() {
        // --list needs no ports and no limits
        let cli = Cli::parse_from(["ping-pong", "--list", "--count", "0", "--duration", "0"]);
        let mut config = Config::default();
        ConfigParser::new(cli).apply_cli_overrides(&mut config);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_summary() {
        let config = overridden(&["--loopback", "--count", "3"]);
        let summary = display_config_summary(&config);

        assert!(summary.contains("Input: -"));
        assert!(summary.contains("Count limit: 3"));
        assert!(summary.contains("Duration limit: none"));
        assert!(summary.contains("Timeout: 2000ms"));
        assert!(summary.contains("Loopback: true"));
    }
}
