//! Session Registry
//!
//! Tracks every session the engine knows about. Each session sits
//! behind its own lock so status updates on one session never block
//! reads of another. The registry holds metadata only; process plumbing
//! lives behind `ProcessHost`.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::host::SpawnSpec;
use crate::models::{Session, SessionConfig, SessionStatus, TermSize};

/// Registry of sessions with per-session locks
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<RwLock<Session>>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Resolve a session config against engine defaults into the fully
    /// specified spec a host needs
    pub fn resolve_spec(config: &SessionConfig, engine: &EngineConfig) -> Result<SpawnSpec> {
        let shell = match &config.shell {
            Some(shell) if shell.trim().is_empty() => {
                return Err(Error::ConfigInvalid {
                    field: "shell".to_string(),
                    reason: "shell must not be empty".to_string(),
                })
            }
            Some(shell) => shell.clone(),
            None => engine.resolve_shell(),
        };

        let working_directory = match &config.working_directory {
            Some(dir) => dir.clone(),
            None => match std::env::current_dir() {
                Ok(dir) => dir,
                Err(_) => dirs::home_dir().ok_or_else(|| Error::ConfigInvalid {
                    field: "working_directory".to_string(),
                    reason: "no working directory given and none could be inferred".to_string(),
                })?,
            },
        };

        let size = config.size.unwrap_or(TermSize {
            cols: engine.default_cols,
            rows: engine.default_rows,
        });
        if size.cols == 0 || size.rows == 0 {
            return Err(Error::ConfigInvalid {
                field: "size".to_string(),
                reason: format!("{}x{} is not a usable terminal size", size.cols, size.rows),
            });
        }

        Ok(SpawnSpec {
            shell,
            working_directory,
            environment: config.environment.clone(),
            size,
        })
    }

    /// Record a freshly spawned session
    pub async fn insert(&self, session: Session) {
        let id = session.id.clone();
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, Arc::new(RwLock::new(session)));
    }

    /// Snapshot of one session
    pub async fn get(&self, session_id: &str) -> Result<Session> {
        let sessions = self.sessions.read().await;
        if let Some(entry) = sessions.get(session_id) {
            Ok(entry.read().await.clone())
        } else {
            Err(Error::SessionNotFound {
                session_id: session_id.to_string(),
            })
        }
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Snapshots of all sessions, newest first
    pub async fn list(&self) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        let mut out = Vec::with_capacity(sessions.len());
        for entry in sessions.values() {
            out.push(entry.read().await.clone());
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Flip a session to `Exited`. Idempotent: a session already marked
    /// exited keeps its first recorded code.
    pub async fn mark_exited(&self, session_id: &str, code: Option<i32>) -> Result<()> {
        let sessions = self.sessions.read().await;
        let entry = sessions
            .get(session_id)
            .ok_or_else(|| Error::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        let mut session = entry.write().await;
        if session.is_running() {
            session.mark_exited(code);
        }
        Ok(())
    }

    /// Record a new terminal size after a successful host resize
    pub async fn update_size(&self, session_id: &str, cols: u16, rows: u16) -> Result<()> {
        let sessions = self.sessions.read().await;
        let entry = sessions
            .get(session_id)
            .ok_or_else(|| Error::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        entry.write().await.size = TermSize { cols, rows };
        Ok(())
    }

    /// Drop a session from the registry, returning its final snapshot
    pub async fn remove(&self, session_id: &str) -> Option<Session> {
        let entry = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(session_id)
        }?;
        let session = entry.read().await.clone();
        Some(session)
    }

    /// Number of sessions still running
    pub async fn active_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        let mut count = 0;
        for entry in sessions.values() {
            if entry.read().await.is_running() {
                count += 1;
            }
        }
        count
    }

    /// Sweep out exited sessions, returning how many were dropped
    pub async fn remove_exited(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut dead = Vec::new();
        for (id, entry) in sessions.iter() {
            if matches!(entry.read().await.status, SessionStatus::Exited(_)) {
                dead.push(id.clone());
            }
        }
        for id in &dead {
            sessions.remove(id);
        }
        dead.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
