//! Process Host abstraction
//!
//! The engine talks to shell processes through the `ProcessHost` trait
//! and never touches process plumbing directly. Two implementations
//! ship with the crate: `PtyProcessHost` drives real pseudoterminals
//! through portable-pty, and `MockProcessHost` is a deterministic
//! in-memory host for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::models::{OutputChunk, TermSize};

pub mod mock;
pub mod pty;

pub use mock::MockProcessHost;
pub use pty::PtyProcessHost;

/// Fully resolved spawn parameters handed to a host. The registry fills
/// in engine defaults before a spec reaches a host, so nothing here is
/// optional.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    /// Shell executable to run
    pub shell: String,
    /// Working directory for the shell
    pub working_directory: PathBuf,
    /// Environment overrides layered on the inherited environment
    pub environment: HashMap<String, String>,
    /// Initial terminal size
    pub size: TermSize,
}

/// Everything a host hands back from a successful spawn
#[derive(Debug)]
pub struct SpawnedSession {
    /// Host-assigned session id
    pub id: String,
    /// OS process id, if the host knows it
    pub pid: Option<u32>,
    /// Output stream. Chunks arrive in emission order; a single `Exit`
    /// chunk is the last thing a well-behaved host sends.
    pub output: mpsc::UnboundedReceiver<OutputChunk>,
}

/// An OS-level service that runs shell processes for the engine.
#[async_trait]
pub trait ProcessHost: Send + Sync {
    /// Spawn a shell process. Fails with `Error::SpawnFailed` carrying
    /// the host's diagnostic text.
    async fn spawn(&self, spec: &SpawnSpec) -> Result<SpawnedSession>;

    /// Write raw bytes to the process's stdin.
    async fn write(&self, session_id: &str, bytes: &[u8]) -> Result<()>;

    /// Change the terminal dimensions without disrupting buffered I/O.
    async fn resize(&self, session_id: &str, cols: u16, rows: u16) -> Result<()>;

    /// Request termination. Unknown or already-dead sessions are a
    /// no-op, not an error.
    async fn kill(&self, session_id: &str) -> Result<()>;

    /// Authoritative exit-code query. `Ok(None)` means the process has
    /// not exited (or the host has no code yet); errors mean the host
    /// cannot answer at all. Callers fall back to heuristic resolution
    /// on anything but `Ok(Some(_))`.
    async fn exit_code(&self, session_id: &str) -> Result<Option<i32>>;
}
