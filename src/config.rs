//! Engine Configuration
//!
//! Defaults and tunables for the engine: shell selection, initial
//! terminal size, and the per-command output capture cap. Loadable
//! from TOML so embedders can ship a config file.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default per-command output capture cap (10 MiB)
pub const DEFAULT_MAX_CAPTURE_BYTES: usize = 10 * 1024 * 1024;

/// Default host read buffer size
pub const DEFAULT_READ_BUFFER_BYTES: usize = 4096;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Shell used when a session config does not name one; None falls
    /// back to `$SHELL` (`%COMSPEC%` on Windows)
    pub default_shell: Option<String>,

    /// Initial columns for sessions that do not specify a size
    pub default_cols: u16,

    /// Initial rows for sessions that do not specify a size
    pub default_rows: u16,

    /// Maximum bytes of output captured into a pending history entry;
    /// further output is dropped and the entry is marked truncated
    pub max_capture_bytes: usize,

    /// Read buffer size used by host implementations
    pub read_buffer_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_shell: None,
            default_cols: 80,
            default_rows: 24,
            max_capture_bytes: DEFAULT_MAX_CAPTURE_BYTES,
            read_buffer_bytes: DEFAULT_READ_BUFFER_BYTES,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default path, falling back to
    /// defaults when no file exists
    pub fn load() -> Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            debug!("No config file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::ConfigLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| Error::ConfigLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration file location
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shellgate")
            .join("config.toml")
    }

    /// Resolve the shell for a session that did not name one
    pub fn resolve_shell(&self) -> String {
        if let Some(shell) = &self.default_shell {
            return shell.clone();
        }

        #[cfg(windows)]
        {
            env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
        }

        #[cfg(not(windows))]
        {
            env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
        }
    }

    /// Validate field ranges
    pub fn validate(&self) -> Result<()> {
        if self.default_cols == 0 {
            return Err(Error::ConfigInvalid {
                field: "default_cols".to_string(),
                reason: "Columns must be greater than 0".to_string(),
            });
        }

        if self.default_rows == 0 {
            return Err(Error::ConfigInvalid {
                field: "default_rows".to_string(),
                reason: "Rows must be greater than 0".to_string(),
            });
        }

        if self.max_capture_bytes == 0 {
            return Err(Error::ConfigInvalid {
                field: "max_capture_bytes".to_string(),
                reason: "Capture cap must be greater than 0".to_string(),
            });
        }

        if self.read_buffer_bytes == 0 {
            return Err(Error::ConfigInvalid {
                field: "read_buffer_bytes".to_string(),
                reason: "Read buffer must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
