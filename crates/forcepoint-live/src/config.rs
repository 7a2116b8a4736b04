//! Live loop configuration
//!
//! The application config file is one TOML document: the estimator sections
//! (`[solver]`, `[output]`, `[calibration]`, `[gate]`, `[smoothing]`) plus a
//! `[live]` section read here.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use forcepoint_core::{ConfigError, PoaConfig};

use crate::tail::TailStart;

/// `[live]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Sensor log to follow
    pub log_path: Option<PathBuf>,
    /// Timer interval between ticks [ms]
    pub interval_ms: u64,
    /// Where reading starts when the loop comes up
    pub start: TailStart,
    /// Delete the sensor log when the loop exits
    pub cleanup_on_exit: bool,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            interval_ms: 1,
            start: TailStart::Beginning,
            cleanup_on_exit: true,
        }
    }
}

impl LiveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LiveSection {
    live: LiveConfig,
}

/// Estimator config plus `[live]`
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub poa: PoaConfig,
    pub live: LiveConfig,
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let poa = PoaConfig::from_toml_str(text)?;
        let section: LiveSection = toml::from_str(text)?;
        Ok(Self {
            poa,
            live: section.live,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LiveConfig::default();
        assert_eq!(config.interval(), Duration::from_millis(1));
        assert_eq!(config.start, TailStart::Beginning);
        assert!(config.cleanup_on_exit);
        assert!(config.log_path.is_none());
    }

    #[test]
    fn test_full_document() {
        let text = r#"
            [solver]
            max_iterations = 900

            [gate]
            force = { sense = "above", threshold = 1.0 }

            [smoothing]
            wrench_window = 4

            [live]
            log_path = "/tmp/ft_log.txt"
            interval_ms = 5
            start = "end"
            cleanup_on_exit = false
        "#;

        let app = AppConfig::from_toml_str(text).unwrap();
        assert_eq!(app.poa.solver.minimizer.max_iterations, 900);
        assert_eq!(app.poa.smoothing.wrench_window, 4);
        assert_eq!(app.poa.smoothing.point_window, 20);
        assert_eq!(app.live.log_path, Some(PathBuf::from("/tmp/ft_log.txt")));
        assert_eq!(app.live.interval_ms, 5);
        assert_eq!(app.live.start, TailStart::End);
        assert!(!app.live.cleanup_on_exit);
    }

    #[test]
    fn test_missing_live_section() {
        let app = AppConfig::from_toml_str("[output]\ndecimals = 2\n").unwrap();
        assert_eq!(app.poa.output.decimals, 2);
        assert_eq!(app.live.interval_ms, 1);
    }
}
