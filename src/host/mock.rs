//! Mock Process Host
//!
//! Deterministic in-memory `ProcessHost` for tests. No processes run;
//! tests script output with `emit_stdout`/`emit_exit` and inspect what
//! the engine forwarded with `written_text`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::{Mutex, RwLock};

use super::{ProcessHost, SpawnSpec, SpawnedSession};
use crate::error::{Error, Result};
use crate::models::OutputChunk;

/// One scripted session
struct MockEntry {
    spec: SpawnSpec,
    written: Vec<Vec<u8>>,
    resizes: Vec<(u16, u16)>,
    /// Taken when the session ends so the output channel closes
    output_tx: Option<UnboundedSender<OutputChunk>>,
    exit_code: Option<i32>,
    alive: bool,
}

/// In-memory host that hands out scripted sessions
pub struct MockProcessHost {
    entries: Arc<RwLock<HashMap<String, MockEntry>>>,
    next_id: AtomicU64,
    fail_next_spawn: Mutex<Option<String>>,
    fail_exit_queries: AtomicBool,
}

impl MockProcessHost {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            fail_next_spawn: Mutex::new(None),
            fail_exit_queries: AtomicBool::new(false),
        }
    }

    /// Make the next `spawn` call fail with the given reason
    pub async fn fail_next_spawn(&self, reason: &str) {
        *self.fail_next_spawn.lock().await = Some(reason.to_string());
    }

    /// Make every `exit_code` query fail, forcing heuristic fallback
    pub fn fail_exit_queries(&self, fail: bool) {
        self.fail_exit_queries.store(fail, Ordering::SeqCst);
    }

    /// Push scripted stdout to a session's output channel
    pub async fn emit_stdout(&self, session_id: &str, text: &str) -> Result<()> {
        let entries = self.entries.read().await;
        let entry = entries
            .get(session_id)
            .ok_or_else(|| Error::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        let tx = entry.output_tx.as_ref().ok_or_else(|| Error::HostIo {
            session_id: session_id.to_string(),
            reason: "session already ended".to_string(),
        })?;
        tx.send(OutputChunk::stdout(session_id, text))
            .map_err(|_| Error::HostIo {
                session_id: session_id.to_string(),
                reason: "output receiver dropped".to_string(),
            })
    }

    /// End a session: record the code, send the final `Exit` chunk and
    /// close the output channel
    pub async fn emit_exit(&self, session_id: &str, code: i32) -> Result<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        entry.exit_code = Some(code);
        entry.alive = false;
        if let Some(tx) = entry.output_tx.take() {
            let _ = tx.send(OutputChunk::exit(session_id));
        }
        Ok(())
    }

    /// Record an exit code without emitting the `Exit` chunk
    pub async fn set_exit_code(&self, session_id: &str, code: i32) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(session_id) {
            entry.exit_code = Some(code);
        }
    }

    /// Close a session's output channel without an `Exit` chunk, as a
    /// crashed host would
    pub async fn drop_output(&self, session_id: &str) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(session_id) {
            entry.output_tx.take();
            entry.alive = false;
        }
    }

    /// Everything written to a session, in write order
    pub async fn written_bytes(&self, session_id: &str) -> Vec<Vec<u8>> {
        let entries = self.entries.read().await;
        entries
            .get(session_id)
            .map(|e| e.written.clone())
            .unwrap_or_default()
    }

    /// Everything written to a session, concatenated as text
    pub async fn written_text(&self, session_id: &str) -> String {
        self.written_bytes(session_id)
            .await
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).to_string())
            .collect()
    }

    /// Resize calls a session has seen
    pub async fn resizes(&self, session_id: &str) -> Vec<(u16, u16)> {
        let entries = self.entries.read().await;
        entries
            .get(session_id)
            .map(|e| e.resizes.clone())
            .unwrap_or_default()
    }

    /// The resolved spec a session was spawned with
    pub async fn spawn_spec(&self, session_id: &str) -> Option<SpawnSpec> {
        let entries = self.entries.read().await;
        entries.get(session_id).map(|e| e.spec.clone())
    }

    pub async fn is_alive(&self, session_id: &str) -> bool {
        let entries = self.entries.read().await;
        entries.get(session_id).map(|e| e.alive).unwrap_or(false)
    }

    pub async fn spawn_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for MockProcessHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessHost for MockProcessHost {
    async fn spawn(&self, spec: &SpawnSpec) -> Result<SpawnedSession> {
        if let Some(reason) = self.fail_next_spawn.lock().await.take() {
            return Err(Error::SpawnFailed {
                shell: spec.shell.clone(),
                reason,
            });
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session_id = format!("mock-{}", n);
        let (output_tx, output_rx) = unbounded_channel();

        let entry = MockEntry {
            spec: spec.clone(),
            written: Vec::new(),
            resizes: Vec::new(),
            output_tx: Some(output_tx),
            exit_code: None,
            alive: true,
        };
        self.entries
            .write()
            .await
            .insert(session_id.clone(), entry);

        Ok(SpawnedSession {
            id: session_id,
            pid: Some(10_000 + n as u32),
            output: output_rx,
        })
    }

    async fn write(&self, session_id: &str, bytes: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        entry.written.push(bytes.to_vec());
        Ok(())
    }

    async fn resize(&self, session_id: &str, cols: u16, rows: u16) -> Result<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        entry.resizes.push((cols, rows));
        Ok(())
    }

    async fn kill(&self, session_id: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(session_id) {
            entry.alive = false;
            entry.output_tx.take();
        }
        Ok(())
    }

    async fn exit_code(&self, session_id: &str) -> Result<Option<i32>> {
        if self.fail_exit_queries.load(Ordering::SeqCst) {
            return Err(Error::HostIo {
                session_id: session_id.to_string(),
                reason: "exit queries disabled".to_string(),
            });
        }
        let entries = self.entries.read().await;
        let entry = entries
            .get(session_id)
            .ok_or_else(|| Error::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        Ok(entry.exit_code)
    }
}
