//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base directory under which run directories are allocated.
    pub output_base: PathBuf,

    /// Default values for a segmentation run.
    pub run: RunDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default run parameters, overridable from the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunDefaults {
    /// Length of each output part in seconds.
    pub part_duration_secs: f64,

    /// Number of segments rendered concurrently.
    pub workers: usize,

    /// Font files per text field.
    pub username_font: PathBuf,
    pub title_font: PathBuf,
    pub part_font: PathBuf,

    /// Colors per text field (named color or hex string).
    pub username_color: String,
    pub title_color: String,
    pub part_color: String,

    /// Kill an encoder that runs longer than this many seconds.
    pub encode_timeout_secs: Option<u64>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelsplit=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_base: PathBuf::from("output"),
            run: RunDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            part_duration_secs: 30.0,
            workers: 1,
            username_font: PathBuf::from("fonts/Montserrat-Italic.ttf"),
            title_font: PathBuf::from("fonts/Philosopher-Bold.ttf"),
            part_font: PathBuf::from("fonts/MarckScript-Regular.ttf"),
            username_color: "#0b789a".to_string(),
            title_color: "#0b789a".to_string(),
            part_color: "#0b789a".to_string(),
            encode_timeout_secs: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Self::default()
        }
    }

    /// Load config from an explicit file, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        match std::fs::read_to_string(config_path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
            }
        }
        Self::default()
    }

    /// Save config to an explicit file.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reelsplit").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.output_base, PathBuf::from("output"));
        assert!((config.run.part_duration_secs - 30.0).abs() < 1e-9);
        assert_eq!(config.run.workers, 1);
        assert_eq!(config.run.title_color, "#0b789a");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.run.workers = 4;
        config.logging.json = true;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.run.workers, 4);
        assert!(loaded.logging.json);
    }

    #[test]
    fn test_partial_file_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"run": {"part_duration_secs": 15.0}}"#).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert!((loaded.run.part_duration_secs - 15.0).abs() < 1e-9);
        assert_eq!(loaded.run.workers, 1);
        assert_eq!(loaded.logging.level, "info");
    }

    #[test]
    fn test_unparseable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.output_base, PathBuf::from("output"));
    }
}
