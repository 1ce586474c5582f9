//! Configuration management for taskminder.
//!
//! Settings are read from `<config dir>/taskminder/config.yaml`. A missing
//! file means defaults; unknown keys are ignored.

use crate::error::{Error, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bound on the wait for a feed's first event.
pub const DEFAULT_SUBSCRIBE_TIMEOUT_SECS: u64 = 5;

/// Default age after which an unconfirmed toggle is reported stale.
pub const DEFAULT_STALE_TOGGLE_SECS: u64 = 10;

/// User ID used by the CLI when no identity service is involved.
pub const DEFAULT_LOCAL_USER: &str = "local";

fn default_subscribe_timeout_secs() -> u64 {
    DEFAULT_SUBSCRIBE_TIMEOUT_SECS
}

fn default_stale_toggle_secs() -> u64 {
    DEFAULT_STALE_TOGGLE_SECS
}

fn default_user_id() -> String {
    DEFAULT_LOCAL_USER.to_string()
}

/// Application settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// SQLite database file; defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// User the CLI acts as.
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Seconds to wait for a feed's first event before showing degraded state.
    #[serde(default = "default_subscribe_timeout_secs")]
    pub subscribe_timeout_secs: u64,

    /// Seconds after which an unconfirmed toggle is reported stale.
    #[serde(default = "default_stale_toggle_secs")]
    pub stale_toggle_secs: u64,

    /// Directory with template overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset, e.g. `taskminder=debug`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            user_id: default_user_id(),
            subscribe_timeout_secs: DEFAULT_SUBSCRIBE_TIMEOUT_SECS,
            stale_toggle_secs: DEFAULT_STALE_TOGGLE_SECS,
            templates_dir: None,
            log_filter: None,
        }
    }
}

impl AppConfig {
    /// Load config from the default location, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        match paths::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load config from a specific file, falling back to defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed or holds
    /// invalid values.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Save config to a specific file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::Config("user_id must not be empty".into()));
        }
        if self.subscribe_timeout_secs == 0 {
            return Err(Error::Config("subscribe_timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    /// The database file to open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no path is configured and the platform
    /// data directory is unknown.
    pub fn database_path(&self) -> Result<PathBuf> {
        self.database_path
            .as_deref()
            .map(paths::expand_home)
            .or_else(paths::default_db_path)
            .ok_or_else(|| Error::Config("cannot determine a database location".into()))
    }

    /// Bound on the wait for a feed's first event.
    #[must_use]
    pub const fn subscribe_timeout(&self) -> Duration {
        Duration::from_secs(self.subscribe_timeout_secs)
    }

    /// Age after which an unconfirmed toggle is stale.
    #[must_use]
    pub const fn stale_toggle_after(&self) -> Duration {
        Duration::from_secs(self.stale_toggle_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.user_id, "local");
        assert_eq!(config.subscribe_timeout(), Duration::from_secs(5));
        assert_eq!(config.stale_toggle_after(), Duration::from_secs(10));
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_config_load_not_found() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let config = AppConfig {
            database_path: Some(dir.path().join("tasks.db")),
            subscribe_timeout_secs: 3,
            log_filter: Some("taskminder=debug".into()),
            ..AppConfig::default()
        };

        config.save_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.database_path().unwrap(), dir.path().join("tasks.db"));
    }

    #[test]
    fn test_config_partial_yaml_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "user_id: sam\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();

        assert_eq!(config.user_id, "sam");
        assert_eq!(config.subscribe_timeout_secs, DEFAULT_SUBSCRIBE_TIMEOUT_SECS);
    }

    #[test]
    fn test_config_yaml_format() {
        let yaml = serde_yaml::to_string(&AppConfig::default()).unwrap();
        assert!(yaml.contains("user_id: local"));
        assert!(yaml.contains("subscribe_timeout_secs: 5"));
        assert!(!yaml.contains("database_path"));
    }

    #[test]
    fn test_config_rejects_zero_timeout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "subscribe_timeout_secs: 0\n").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_config_invalid_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "user_id: [unclosed").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(Error::Yaml(_))));
    }
}
