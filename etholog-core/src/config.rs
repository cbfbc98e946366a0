//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/etholog/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/etholog/` (~/.config/etholog/)
//! - Data: `$XDG_DATA_HOME/etholog/` (~/.local/share/etholog/)
//! - State/Logs: `$XDG_STATE_HOME/etholog/` (~/.local/state/etholog/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Locations of the three experiment schemas
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Derived-metric settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// File locations of the `experiment`, `behavior` and `stimulus` schemas.
///
/// Each file is attached to a single connection under its schema name.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_experiment_path")]
    pub experiment: PathBuf,

    #[serde(default = "default_behavior_path")]
    pub behavior: PathBuf,

    #[serde(default = "default_stimulus_path")]
    pub stimulus: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            experiment: default_experiment_path(),
            behavior: default_behavior_path(),
            stimulus: default_stimulus_path(),
        }
    }
}

impl DatabaseConfig {
    /// All three schema files under one directory, with default file names.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            experiment: dir.join("experiment.db"),
            behavior: dir.join("behavior.db"),
            stimulus: dir.join("stimulus.db"),
        }
    }
}

fn default_experiment_path() -> PathBuf {
    Config::data_dir().join("experiment.db")
}

fn default_behavior_path() -> PathBuf {
    Config::data_dir().join("behavior.db")
}

fn default_stimulus_path() -> PathBuf {
    Config::data_dir().join("stimulus.db")
}

/// Settings for derived metrics
#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// State names that mark a trial as rewarded
    #[serde(default = "default_reward_states")]
    pub reward_states: Vec<String>,

    /// State names that mark a trial as punished
    #[serde(default = "default_punish_states")]
    pub punish_states: Vec<String>,

    /// Default minimum trial count for session listings
    #[serde(default)]
    pub min_trials: usize,

    /// Window (in decisive trials) for rolling performance
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            reward_states: default_reward_states(),
            punish_states: default_punish_states(),
            min_trials: 0,
            rolling_window: default_rolling_window(),
        }
    }
}

impl AnalysisConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.reward_states.is_empty() {
            return Err(Error::Config(
                "analysis.reward_states must name at least one state".to_string(),
            ));
        }
        if self.punish_states.is_empty() {
            return Err(Error::Config(
                "analysis.punish_states must name at least one state".to_string(),
            ));
        }
        if let Some(state) = self
            .reward_states
            .iter()
            .find(|s| self.punish_states.contains(s))
        {
            return Err(Error::Config(format!(
                "state {:?} cannot be both a reward and a punish state",
                state
            )));
        }
        if self.rolling_window == 0 {
            return Err(Error::Config(
                "analysis.rolling_window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_reward_states() -> Vec<String> {
    vec!["Reward".to_string()]
}

fn default_punish_states() -> Vec<String> {
    vec!["Punish".to_string()]
}

fn default_rolling_window() -> usize {
    20
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/etholog/config.toml` (~/.config/etholog/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("etholog").join("config.toml")
    }

    /// Returns the data directory path (default home of the schema files)
    ///
    /// `$XDG_DATA_HOME/etholog/` (~/.local/share/etholog/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("etholog")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/etholog/` (~/.local/state/etholog/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("etholog")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.analysis.reward_states, vec!["Reward"]);
        assert_eq!(config.analysis.punish_states, vec!["Punish"]);
        assert_eq!(config.analysis.min_trials, 0);
        assert_eq!(config.analysis.rolling_window, 20);
        assert!(config.database.experiment.ends_with("experiment.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[database]
experiment = "/data/lab/experiment.db"
behavior = "/data/lab/behavior.db"

[analysis]
reward_states = ["Reward", "LateReward"]
min_trials = 50

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(
            config.database.experiment,
            PathBuf::from("/data/lab/experiment.db")
        );
        assert!(config.database.stimulus.ends_with("stimulus.db"));
        assert_eq!(config.analysis.reward_states.len(), 2);
        assert_eq!(config.analysis.punish_states, vec!["Punish"]);
        assert_eq!(config.analysis.min_trials, 50);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_analysis_validation() {
        let config = AnalysisConfig {
            reward_states: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AnalysisConfig {
            punish_states: vec!["Reward".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AnalysisConfig {
            rolling_window: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_rejects_invalid_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[analysis]\nrolling_window = 0\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));

        std::fs::write(&path, "[analysis\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_database_config_in_dir() {
        let config = DatabaseConfig::in_dir(Path::new("/tmp/lab"));
        assert_eq!(config.behavior, PathBuf::from("/tmp/lab/behavior.db"));
        assert_eq!(config.stimulus, PathBuf::from("/tmp/lab/stimulus.db"));
    }
}
