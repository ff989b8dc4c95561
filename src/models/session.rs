//! Session Model
//!
//! Represents one live shell process under the engine's management.
//! Sessions are owned exclusively by the session registry and are
//! referenced by id everywhere else; clones handed out are snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Terminal dimensions in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSize {
    /// Number of columns
    pub cols: u16,
    /// Number of rows
    pub rows: u16,
}

impl Default for TermSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// Status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SessionStatus {
    /// Shell process is running
    #[default]
    Running,
    /// Shell process has exited; code is None when the host could not report one
    Exited(Option<i32>),
}

/// Configuration for creating a session
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionConfig {
    /// Shell executable; None selects the engine default
    pub shell: Option<String>,

    /// Working directory; None inherits the engine process directory
    pub working_directory: Option<PathBuf>,

    /// Environment variable overrides layered on top of the inherited environment
    pub environment: HashMap<String, String>,

    /// Initial terminal size; None selects the engine default
    pub size: Option<TermSize>,
}

impl SessionConfig {
    /// Create a config for a specific shell with default everything else
    pub fn for_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: Some(shell.into()),
            ..Default::default()
        }
    }

    /// Set the working directory
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Add an environment override
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Set the initial terminal size
    pub fn with_size(mut self, cols: u16, rows: u16) -> Self {
        self.size = Some(TermSize { cols, rows });
        self
    }
}

/// A live shell session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier (opaque unique token, assigned by the host on spawn)
    pub id: String,

    /// Shell executable backing the session
    pub shell: String,

    /// Working directory the shell was started in
    pub working_directory: PathBuf,

    /// Environment overrides the shell was started with
    pub environment: HashMap<String, String>,

    /// Current terminal size
    pub size: TermSize,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Host-reported process id, if available
    pub pid: Option<u32>,

    /// Current status
    pub status: SessionStatus,
}

impl Session {
    /// Create a session record for a freshly spawned process
    pub fn new(
        id: String,
        shell: String,
        working_directory: PathBuf,
        environment: HashMap<String, String>,
        size: TermSize,
        pid: Option<u32>,
    ) -> Self {
        Self {
            id,
            shell,
            working_directory,
            environment,
            size,
            created_at: Utc::now(),
            pid,
            status: SessionStatus::Running,
        }
    }

    /// Mark the session as exited with an optional exit code
    pub fn mark_exited(&mut self, code: Option<i32>) {
        self.status = SessionStatus::Exited(code);
    }

    /// Check if the session is still running
    pub fn is_running(&self) -> bool {
        matches!(self.status, SessionStatus::Running)
    }

    /// Exit code, if the session has exited and the host reported one
    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            SessionStatus::Exited(code) => code,
            SessionStatus::Running => None,
        }
    }
}
