//! PTY Process Host
//!
//! Real pseudoterminals through portable-pty. Blocking PTY I/O is
//! bridged to the async side with background threads: a reader thread
//! pumps master output into an unbounded channel, a writer thread
//! drains an input channel into the master, and a waiter thread records
//! the child's exit code and emits the final `Exit` chunk once the
//! reader has drained everything.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{ProcessHost, SpawnSpec, SpawnedSession};
use crate::config::DEFAULT_READ_BUFFER_BYTES;
use crate::error::{Error, Result};
use crate::models::OutputChunk;

const MAX_CONSECUTIVE_READ_ERRORS: u32 = 5;
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// One live PTY under this host
struct PtyEntry {
    /// Feeds the writer thread; dropping it ends the thread
    input_tx: Sender<Vec<u8>>,
    /// Kept for resize; portable-pty masters are Send but not Sync
    master: Mutex<Box<dyn MasterPty + Send>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    /// Set exactly once by the waiter thread
    exit_code: Arc<OnceCell<i32>>,
}

/// Process host backed by real pseudoterminals
pub struct PtyProcessHost {
    entries: Arc<RwLock<HashMap<String, Arc<PtyEntry>>>>,
    read_buffer_bytes: usize,
}

impl PtyProcessHost {
    /// Create a host with the default read buffer size
    pub fn new() -> Self {
        Self::with_read_buffer(DEFAULT_READ_BUFFER_BYTES)
    }

    /// Create a host with a specific read buffer size
    pub fn with_read_buffer(read_buffer_bytes: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            read_buffer_bytes,
        }
    }

    /// Number of sessions this host still holds entries for
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn entry(&self, session_id: &str) -> Result<Arc<PtyEntry>> {
        let entries = self.entries.read().await;
        entries
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }
}

impl Default for PtyProcessHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessHost for PtyProcessHost {
    async fn spawn(&self, spec: &SpawnSpec) -> Result<SpawnedSession> {
        let session_id = Uuid::new_v4().to_string();

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: spec.size.rows,
                cols: spec.size.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| Error::SpawnFailed {
                shell: spec.shell.clone(),
                reason: e.to_string(),
            })?;

        let mut cmd = CommandBuilder::new(&spec.shell);
        cmd.cwd(&spec.working_directory);
        for (key, value) in &spec.environment {
            cmd.env(key, value);
        }

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| Error::SpawnFailed {
                shell: spec.shell.clone(),
                reason: e.to_string(),
            })?;
        // The child holds its own slave handles; ours must go so the
        // reader sees EOF when the child exits
        drop(pair.slave);

        let pid = child.process_id();
        let killer = child.clone_killer();

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| Error::SpawnFailed {
                shell: spec.shell.clone(),
                reason: e.to_string(),
            })?;
        let mut writer = pair.master.take_writer().map_err(|e| Error::SpawnFailed {
            shell: spec.shell.clone(),
            reason: e.to_string(),
        })?;

        let (output_tx, output_rx) = unbounded_channel::<OutputChunk>();
        let (input_tx, input_rx) = channel::<Vec<u8>>();
        let exit_code = Arc::new(OnceCell::new());

        // Reader thread: blocking master reads -> output channel
        let reader_tx = output_tx.clone();
        let reader_session = session_id.clone();
        let buf_size = self.read_buffer_bytes;
        let reader_handle = thread::spawn(move || {
            let mut buf = vec![0u8; buf_size];
            let mut consecutive_errors = 0;

            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        debug!("PTY read EOF for session {}", reader_session);
                        break;
                    }
                    Ok(n) => {
                        consecutive_errors = 0;
                        let chunk = OutputChunk::stdout(
                            &reader_session,
                            String::from_utf8_lossy(&buf[..n]),
                        );
                        if reader_tx.send(chunk).is_err() {
                            debug!("Output receiver dropped, stopping reader for {}", reader_session);
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(10));
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        warn!(
                            "PTY read error for session {} ({}): {} ({}/{})",
                            reader_session,
                            e.kind(),
                            e,
                            consecutive_errors,
                            MAX_CONSECUTIVE_READ_ERRORS
                        );
                        if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                            error!("Too many PTY read errors, stopping reader for {}", reader_session);
                            break;
                        }
                        thread::sleep(Duration::from_millis(50));
                    }
                }
            }
        });

        // Writer thread: input channel -> blocking master writes
        let writer_session = session_id.clone();
        thread::spawn(move || {
            while let Ok(data) = input_rx.recv() {
                let mut attempts = 0;
                loop {
                    match writer.write_all(&data) {
                        Ok(()) => {
                            if let Err(e) = writer.flush() {
                                debug!("PTY flush error for session {}: {}", writer_session, e);
                            }
                            break;
                        }
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e)
                            if e.kind() == ErrorKind::WouldBlock
                                && attempts < MAX_WRITE_ATTEMPTS =>
                        {
                            attempts += 1;
                            thread::sleep(Duration::from_millis(10));
                        }
                        Err(e) => {
                            warn!("PTY write error for session {}: {}", writer_session, e);
                            return;
                        }
                    }
                }
            }
            debug!("PTY writer thread exiting for session {}", writer_session);
        });

        // Waiter thread: record the exit code, let the reader drain,
        // then emit the final Exit chunk
        let waiter_exit = Arc::clone(&exit_code);
        let waiter_session = session_id.clone();
        thread::spawn(move || {
            match child.wait() {
                Ok(status) => {
                    let code = status.exit_code() as i32;
                    debug!("Session {} exited with code {}", waiter_session, code);
                    let _ = waiter_exit.set(code);
                }
                Err(e) => {
                    warn!("Wait failed for session {}: {}", waiter_session, e);
                }
            }
            let _ = reader_handle.join();
            let _ = output_tx.send(OutputChunk::exit(&waiter_session));
        });

        let entry = Arc::new(PtyEntry {
            input_tx,
            master: Mutex::new(pair.master),
            killer: Mutex::new(killer),
            exit_code,
        });
        self.entries
            .write()
            .await
            .insert(session_id.clone(), entry);

        info!(
            "Spawned PTY session {} ({} in {:?}, pid {:?})",
            session_id, spec.shell, spec.working_directory, pid
        );

        Ok(SpawnedSession {
            id: session_id,
            pid,
            output: output_rx,
        })
    }

    async fn write(&self, session_id: &str, bytes: &[u8]) -> Result<()> {
        let entry = self.entry(session_id).await?;
        entry
            .input_tx
            .send(bytes.to_vec())
            .map_err(|_| Error::HostIo {
                session_id: session_id.to_string(),
                reason: "writer thread is gone".to_string(),
            })
    }

    async fn resize(&self, session_id: &str, cols: u16, rows: u16) -> Result<()> {
        let entry = self.entry(session_id).await?;
        let master = entry.master.lock().await;
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| Error::HostIo {
                session_id: session_id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn kill(&self, session_id: &str) -> Result<()> {
        let entry = {
            let mut entries = self.entries.write().await;
            entries.remove(session_id)
        };

        match entry {
            Some(entry) => {
                let mut killer = entry.killer.lock().await;
                if let Err(e) = killer.kill() {
                    // Already-dead children commonly error here
                    debug!("Kill for session {} reported: {}", session_id, e);
                }
                Ok(())
            }
            None => {
                debug!("Kill for unknown session {} is a no-op", session_id);
                Ok(())
            }
        }
    }

    async fn exit_code(&self, session_id: &str) -> Result<Option<i32>> {
        let entry = self.entry(session_id).await?;
        Ok(entry.exit_code.get().copied())
    }
}
