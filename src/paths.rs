//! Path utilities for determining where taskminder stores its files.
//!
//! Configuration lives in the platform config directory and the database in
//! the platform data directory, both under a `taskminder/` subdirectory.

use std::path::{Path, PathBuf};

/// The subdirectory name used under the platform directories.
const APP_DIR_NAME: &str = "taskminder";

/// The configuration filename.
pub const CONFIG_FILENAME: &str = "config.yaml";

/// The database filename.
pub const DATABASE_FILENAME: &str = "taskminder.sqlite3";

/// Get the taskminder configuration directory.
///
/// Returns `<config dir>/taskminder/` or `None` if the platform config
/// directory cannot be determined.
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME))
}

/// Get the taskminder data directory.
///
/// Falls back to `~/.taskminder/` when the platform data directory is unknown.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .or_else(|| dirs::home_dir().map(|home| home.join(format!(".{APP_DIR_NAME}"))))
}

/// Path of the configuration file.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Default database path.
#[must_use]
pub fn default_db_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join(DATABASE_FILENAME))
}

/// Expand a leading `~/` to the home directory.
#[must_use]
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
