use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

pub const DATA_DIR_ENV: &str = "ZEROSPHERE_DATA_DIR";
pub const HISTORY_WINDOW_ENV: &str = "ZEROSPHERE_HISTORY_WINDOW";
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Runtime settings for the calculator front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the persisted histories.
    pub data_dir: PathBuf,
    /// How many recent snapshots the history views and exports cover. Zero
    /// means the default; see [`Config::window`].
    pub history_window: usize,
    /// Used when RUST_LOG is unset.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from(".zerosphere"),
            history_window: DEFAULT_HISTORY_WINDOW,
            log_filter: "zerosphere_carbon=info".to_string(),
        }
    }
}

impl Config {
    /// Load from a JSON file. A missing file yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Apply `ZEROSPHERE_*` overrides from the given lookup.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(DATA_DIR_ENV) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(HISTORY_WINDOW_ENV) {
            self.history_window = match raw.trim().parse::<usize>() {
                Ok(n) => n,
                Err(_) => {
                    return Err(ConfigError::InvalidEnv {
                        key: HISTORY_WINDOW_ENV,
                        value: raw,
                    })
                }
            };
        }
        Ok(self)
    }

    /// Effective window for a request: an explicit non-zero count wins, then the
    /// configured window, then the default. Zero never means "nothing".
    pub fn window(&self, requested: Option<usize>) -> usize {
        [requested.unwrap_or(0), self.history_window]
            .into_iter()
            .find(|&n| n > 0)
            .unwrap_or(DEFAULT_HISTORY_WINDOW)
    }

    /// File, then process environment.
    pub fn resolve(path: &Path) -> Result<Self, ConfigError> {
        Self::load(path)?.with_env(|k| std::env::var(k).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("zerosphere.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.history_window, 10);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"history_window": 25}}"#).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.history_window, 25);
        assert_eq!(config.data_dir, PathBuf::from(".zerosphere"));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "history_window = 25").unwrap();
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [(DATA_DIR_ENV, "/var/lib/zs"), (HISTORY_WINDOW_ENV, "5")]
            .into_iter()
            .collect();
        let config = Config::default()
            .with_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/zs"));
        assert_eq!(config.history_window, 5);

        let err = Config::default()
            .with_env(|k| (k == HISTORY_WINDOW_ENV).then(|| "zero".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_zero_window_falls_back_everywhere() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"history_window": 0}}"#).unwrap();
        let from_file = Config::load(file.path()).unwrap();
        assert_eq!(from_file.window(None), DEFAULT_HISTORY_WINDOW);

        let from_env = Config::default()
            .with_env(|k| (k == HISTORY_WINDOW_ENV).then(|| "0".to_string()))
            .unwrap();
        assert_eq!(from_env.window(None), DEFAULT_HISTORY_WINDOW);

        let config = Config {
            history_window: 4,
            ..Config::default()
        };
        assert_eq!(config.window(Some(0)), 4);
        assert_eq!(config.window(None), 4);
        assert_eq!(config.window(Some(3)), 3);
    }
}
