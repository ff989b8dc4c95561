//! Error types and Result aliases for Shellgate

use std::fmt;
use std::path::PathBuf;

/// Result type alias for Shellgate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Shellgate
#[derive(Debug)]
pub enum Error {
    // === Session errors ===
    /// Process Host could not create a session
    SpawnFailed {
        shell: String,
        reason: String,
    },

    /// Operation targeted an unknown or dead session
    SessionNotFound {
        session_id: String,
    },

    /// Host-side I/O failed for a live session
    HostIo {
        session_id: String,
        reason: String,
    },

    // === Configuration errors ===
    /// Failed to load configuration file
    ConfigLoadFailed {
        path: PathBuf,
        reason: String,
    },

    /// Configuration validation failed
    ConfigInvalid {
        field: String,
        reason: String,
    },

    // === I/O and serialization errors ===
    /// I/O errors
    Io(std::io::Error),

    /// Serialization errors
    Serde(serde_json::Error),

    /// TOML parsing errors
    Toml(toml::de::Error),

    /// Regex compilation errors
    Regex(regex::Error),

    // === Generic fallback (use sparingly) ===
    /// Generic errors (for cases not yet categorized)
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Session errors
            Error::SpawnFailed { shell, reason } => {
                write!(f, "Failed to spawn session for shell '{}': {}", shell, reason)
            }
            Error::SessionNotFound { session_id } => {
                write!(f, "Session '{}' not found", session_id)
            }
            Error::HostIo { session_id, reason } => {
                write!(f, "Host I/O failed for session '{}': {}", session_id, reason)
            }

            // Configuration errors
            Error::ConfigLoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path.display(), reason)
            }
            Error::ConfigInvalid { field, reason } => {
                write!(f, "Configuration validation failed for '{}': {}", field, reason)
            }

            // I/O and serialization errors
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Serde(err) => write!(f, "Serialization error: {}", err),
            Error::Toml(err) => write!(f, "TOML parsing error: {}", err),
            Error::Regex(err) => write!(f, "Regex compilation error: {}", err),

            // Generic fallback
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Toml(err)
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Regex(err)
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error::Other(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Error::Other(err.to_string())
    }
}
