//! Storage configuration and path management for timelog.
//!
//! `StorageConfig` is the single place that decides where timelog keeps its
//! files. Tests inject a temp directory through [`StorageConfig::with_root`].
//!
//! ```text
//! ~/.timelog/
//! ├── timelog.json   # sessions + daily aggregates
//! ├── config.toml    # user preferences
//! └── logs/          # rolling log files
//! ```

use std::path::{Path, PathBuf};

use crate::error::{Result, TimelogError};

/// Environment variable that overrides the root directory.
pub const TIMELOG_HOME_ENV: &str = "TIMELOG_HOME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Root directory for all timelog data (default: ~/.timelog)
    root: PathBuf,
}

impl StorageConfig {
    /// Resolves the root from `TIMELOG_HOME`, falling back to `~/.timelog`.
    pub fn from_env() -> Result<Self> {
        if let Some(root) = std::env::var_os(TIMELOG_HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::with_root(PathBuf::from(root)));
        }
        let home = dirs::home_dir().ok_or(TimelogError::HomeDirNotFound)?;
        Ok(Self::with_root(home.join(".timelog")))
    }

    /// Creates a StorageConfig with a custom root directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to timelog.json (session log and daily aggregates).
    pub fn data_file(&self) -> PathBuf {
        self.root.join("timelog.json")
    }

    /// Path to config.toml (user preferences).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Path to logs/ directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Ensures the root and logs directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        let logs_dir = self.logs_dir();
        fs_err::create_dir_all(&logs_dir).map_err(|e| TimelogError::Io {
            context: format!("creating {}", logs_dir.display()),
            source: e,
        })
    }
}
