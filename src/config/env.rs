//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    ///
    /// Variables already present in the environment take precedence over
    /// values in the file.
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug).map(|_| ())
    }

    /// Load a specific env file; returns whether it existed
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<bool> {
        if !path.exists() {
            if debug {
                eprintln!("No {} file found, using defaults and CLI arguments", path.display());
            }
            return Ok(false);
        }

        dotenv::from_path(path)
            .map_err(|e| AppError::config(format!("Failed to load {} file: {}", path.display(), e)))?;
        if debug {
            eprintln!("Loaded configuration from {}", path.display());
        }
        Ok(true)
    }

    /// Whether a supported variable is set in the environment
    pub fn is_set(key: &str) -> bool {
        std::env::var_os(key).is_some()
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# MIDI Ping-Pong Configuration
#
# Values here are used as defaults and can be overridden by
# command-line arguments.

# Device IDs as printed by `ping-pong --list`
# PING_PONG_IN=1
# PING_PONG_OUT=1

# Stop after this many iterations (0 = no count limit)
# PING_PONG_COUNT=0

# Stop after this many seconds (0 = no duration limit)
# PING_PONG_DURATION_SECS=30

# Pong deadline in milliseconds
# PING_PONG_TIMEOUT_MS=2000

# Pause between iterations in milliseconds
# PING_PONG_INTERVAL_MS=20

# Graph output file
# PING_PONG_GRAPH_FILENAME=results/output.svg

# Enable colored output (true/false)
# ENABLE_COLOR=true
"#.to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "PING_PONG_IN" | "PING_PONG_OUT" => {
                value.parse::<usize>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            "PING_PONG_COUNT" => {
                value.parse::<u32>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            "PING_PONG_DURATION_SECS" => {
                value.parse::<u64>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            "PING_PONG_TIMEOUT_MS" => {
                let timeout: u64 = value.parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if timeout == 0 || timeout > 60_000 {
                    return Err(AppError::config(format!("{} must be between 1 and 60000, got: {}", key, timeout)));
                }
            }
            "PING_PONG_INTERVAL_MS" => {
                let interval: u64 = value.parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if interval > 10_000 {
                    return Err(AppError::config(format!("{} cannot exceed 10000, got: {}", key, interval)));
                }
            }
            "PING_PONG_GRAPH_FILENAME" => {
                if value.is_empty() {
                    return Err(AppError::config(format!("{} cannot be empty", key)));
                }
            }
            "ENABLE_COLOR" => {
                value.parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("PING_PONG_IN", "Input device ID", "1"),
            ("PING_PONG_OUT", "Output device ID", "1"),
            ("PING_PONG_COUNT", "Iteration limit, 0 for none", "100"),
            ("PING_PONG_DURATION_SECS", "Duration limit in seconds, 0 for none", "30"),
            ("PING_PONG_TIMEOUT_MS", "Pong deadline in milliseconds (1-60000)", "2000"),
            ("PING_PONG_INTERVAL_MS", "Pause between iterations in milliseconds", "20"),
            ("PING_PONG_GRAPH_FILENAME", "Graph output file", "results/output.svg"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(var_name, _, _)| {
                let value = std::env::var(var_name).ok()?;
                Self::validate_env_var(var_name, &value)
                    .err()
                    .map(|e| format!("Warning: {}", e))
            })
            .collect()
    }

    /// Check an env file's contents without loading it
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut warnings = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if let Err(e) = Self::validate_env_var(key.trim(), value) {
                    warnings.push(format!("Line '{}': {}", line, e));
                }
            }
        }

        Ok(Some(warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_example_content_lists_every_variable() {
        let content = EnvManager::create_example_env_content();
        for (name, _, _) in EnvManager::get_supported_env_vars() {
            assert!(content.contains(&format!("{}=", name)), "{name} missing");
        }
    }

    #[test]
    fn test_save_example_file() {
        let temp_file = NamedTempFile::new().unwrap();
        EnvManager::save_example_env_file(temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("MIDI Ping-Pong Configuration"));
    }

    #[test]
    fn test_validate_env_var() {
        assert!(EnvManager::validate_env_var("PING_PONG_IN", "2").is_ok());
        assert!(EnvManager::validate_env_var("PING_PONG_COUNT", " 0 ").is_ok());
        assert!(EnvManager::validate_env_var("PING_PONG_TIMEOUT_MS", "2000").is_ok());
        assert!(EnvManager::validate_env_var("PING_PONG_INTERVAL_MS", "0").is_ok());
        assert!(EnvManager::validate_env_var("ENABLE_COLOR", "false").is_ok());
        assert!(EnvManager::validate_env_var("SOMETHING_ELSE", "whatever").is_ok());

        assert!(EnvManager::validate_env_var("PING_PONG_OUT", "-1").is_err());
        assert!(EnvManager::validate_env_var("PING_PONG_TIMEOUT_MS", "0").is_err());
        assert!(EnvManager::validate_env_var("PING_PONG_TIMEOUT_MS", "60001").is_err());
        assert!(EnvManager::validate_env_var("PING_PONG_INTERVAL_MS", "10001").is_err());
        assert!(EnvManager::validate_env_var("PING_PONG_GRAPH_FILENAME", "  ").is_err());
        assert!(EnvManager::validate_env_var("ENABLE_COLOR", "maybe").is_err());
    }

    #[test]
    fn test_check_env_file() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(
            temp_file.path(),
            "# comment\nPING_PONG_IN=1\nPING_PONG_TIMEOUT_MS=0\n\nENABLE_COLOR=yes\n",
        )
        .unwrap();

        let warnings = EnvManager::check_env_file(temp_file.path()).unwrap().unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("PING_PONG_TIMEOUT_MS"));

        let missing = temp_file.path().with_extension("missing");
        assert!(EnvManager::check_env_file(&missing).unwrap().is_none());
    }

    #[test]
    fn test_missing_env_file_is_not_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let loaded = EnvManager::load_env_file_from(&dir.path().join(".env"), false).unwrap();
        assert!(!loaded);
    }
}
