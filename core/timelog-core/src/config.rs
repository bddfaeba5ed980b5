//! User preferences loaded from `config.toml`.
//!
//! A missing file yields defaults. A file that exists but does not parse is an
//! error rather than a silent fallback.
//!
//! ```toml
//! data_file = "/home/me/.timelog.json"
//! default_category = "study"
//! stats_days = 7
//! log_days = 30
//! export_days = 30
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, TimelogError};
use crate::storage::StorageConfig;
use crate::types::Category;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimelogConfig {
    /// Overrides the data file location (e.g. to keep using `~/.timelog.json`).
    pub data_file: Option<PathBuf>,
    pub default_category: Category,
    /// Window for `stats` and `chart` when no date is given.
    pub stats_days: u32,
    /// Window for `log`.
    pub log_days: u32,
    /// Window for `export`.
    pub export_days: u32,
}

impl Default for TimelogConfig {
    fn default() -> Self {
        TimelogConfig {
            data_file: None,
            default_category: Category::Study,
            stats_days: 7,
            log_days: 30,
            export_days: 30,
        }
    }
}

impl TimelogConfig {
    /// Data file path: the configured override, else the storage default.
    /// Relative overrides resolve against the storage root.
    pub fn data_path(&self, storage: &StorageConfig) -> PathBuf {
        match &self.data_file {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => storage.root().join(path),
            None => storage.data_file(),
        }
    }
}

/// Loads `config.toml` from the storage root.
pub fn load_config(storage: &StorageConfig) -> Result<TimelogConfig> {
    load_config_from(&storage.config_file())
}

pub fn load_config_from(path: &Path) -> Result<TimelogConfig> {
    if !path.exists() {
        return Ok(TimelogConfig::default());
    }

    let content = fs_err::read_to_string(path).map_err(|e| TimelogError::Io {
        context: format!("reading config {}", path.display()),
        source: e,
    })?;
    let config: TimelogConfig =
        toml::from_str(&content).map_err(|e| TimelogError::ConfigMalformed {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;

    if config.stats_days == 0 || config.log_days == 0 || config.export_days == 0 {
        return Err(TimelogError::ConfigMalformed {
            path: path.to_path_buf(),
            details: "day windows must be at least 1".to_string(),
        });
    }
    tracing::debug!(path = %path.display(), "Loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load_config_from(&temp.path().join("config.toml")).unwrap();
        assert_eq!(config, TimelogConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs_err::write(&path, "default_category = \"game\"\nstats_days = 14\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.default_category, Category::Game);
        assert_eq!(config.stats_days, 14);
        assert_eq!(config.log_days, 30);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs_err::write(&path, "default_category = \"work\"\n").unwrap();
        assert!(matches!(
            load_config_from(&path),
            Err(TimelogError::ConfigMalformed { .. })
        ));

        fs_err::write(&path, "stats_days = 0\n").unwrap();
        assert!(matches!(
            load_config_from(&path),
            Err(TimelogError::ConfigMalformed { .. })
        ));
    }

    #[test]
    fn test_data_path_resolution() {
        let storage = StorageConfig::with_root(PathBuf::from("/tmp/timelog"));
        let mut config = TimelogConfig::default();
        assert_eq!(config.data_path(&storage), storage.data_file());

        config.data_file = Some(PathBuf::from("/data/log.json"));
        assert_eq!(config.data_path(&storage), PathBuf::from("/data/log.json"));

        config.data_file = Some(PathBuf::from("alt.json"));
        assert_eq!(config.data_path(&storage), PathBuf::from("/tmp/timelog/alt.json"));
    }
}
