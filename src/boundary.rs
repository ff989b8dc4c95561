//! Command Boundary Tracker
//!
//! Reconstructs logical command lines from raw keystroke streams, one
//! state machine per session. Printable characters accumulate, DEL and
//! backspace pop, and a line terminator emits the buffer as a completed
//! command. Everything else passes through untouched; the tracker never
//! alters what gets forwarded to the host, it only watches.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::error::{Error, Result};

/// Result of observing an input fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryResult {
    /// No terminator seen; the buffer is still accumulating
    Accumulating,
    /// A terminator fired; carries the reconstructed command line.
    /// An empty string means the terminator hit an empty buffer and
    /// callers must treat it as "no command".
    CommandReady(String),
}

impl BoundaryResult {
    /// The completed command, if a non-empty boundary fired
    pub fn command(&self) -> Option<&str> {
        match self {
            BoundaryResult::CommandReady(cmd) if !cmd.is_empty() => Some(cmd),
            _ => None,
        }
    }
}

/// Per-session command-line reconstruction state
#[derive(Debug, Default)]
pub struct CommandBoundaryState {
    /// Accumulated printable characters of the line being typed
    buffer: String,
    /// Set after a CR so an immediately following LF counts as the tail
    /// of one CRLF terminator, not a second boundary. Persists across
    /// fragments so a split CR|LF still collapses.
    pending_cr: bool,
}

impl CommandBoundaryState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Process an input fragment byte by byte and return the last
    /// boundary that fired, or `Accumulating` if none did. Trailing
    /// characters after a terminator start the next buffer.
    pub fn observe(&mut self, fragment: &str) -> BoundaryResult {
        let mut last_boundary: Option<String> = None;

        for byte in fragment.bytes() {
            match byte {
                b'\r' => {
                    last_boundary = Some(self.emit());
                    self.pending_cr = true;
                }
                b'\n' => {
                    if self.pending_cr {
                        // Tail of a CRLF pair; the CR already emitted
                        self.pending_cr = false;
                    } else {
                        last_boundary = Some(self.emit());
                    }
                }
                0x7F | 0x08 => {
                    // DEL / BS: pop one character, no-op on empty.
                    // The buffer only ever holds printable ASCII, so
                    // pop removes exactly one typed character.
                    self.pending_cr = false;
                    self.buffer.pop();
                }
                b if (0x20..0x7F).contains(&b) => {
                    self.pending_cr = false;
                    self.buffer.push(b as char);
                }
                _ => {
                    // Other control and non-ASCII bytes are forwarded
                    // raw by the input pipeline but do not affect the
                    // reconstructed line
                    self.pending_cr = false;
                }
            }
        }

        match last_boundary {
            Some(cmd) => BoundaryResult::CommandReady(cmd),
            None => BoundaryResult::Accumulating,
        }
    }

    /// Current buffer contents
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Number of characters currently buffered
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn emit(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}

/// Tracks one `CommandBoundaryState` per session.
///
/// States are registered when a session is created and dropped when it
/// is killed. A session's state is never touched by another session's
/// input stream; the map is keyed strictly by session id.
pub struct CommandBoundaryTracker {
    states: Arc<RwLock<HashMap<String, Arc<Mutex<CommandBoundaryState>>>>>,
}

impl CommandBoundaryTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start tracking a session
    pub async fn register(&self, session_id: &str) {
        let mut states = self.states.write().await;
        states.insert(
            session_id.to_string(),
            Arc::new(Mutex::new(CommandBoundaryState::new())),
        );
        debug!("Tracking command boundaries for session {}", session_id);
    }

    /// Stop tracking a session and drop its buffer
    pub async fn remove(&self, session_id: &str) {
        let mut states = self.states.write().await;
        states.remove(session_id);
    }

    /// Observe a fragment for a session
    pub async fn observe(&self, session_id: &str, fragment: &str) -> Result<BoundaryResult> {
        let state = self.state(session_id).await?;
        let mut state = state.lock().await;
        Ok(state.observe(fragment))
    }

    /// Current buffer contents for a session
    pub async fn buffer(&self, session_id: &str) -> Result<String> {
        let state = self.state(session_id).await?;
        let state = state.lock().await;
        Ok(state.buffer().to_string())
    }

    /// Handle to a session's state. The input pipeline holds the lock
    /// across observe, interception, and forwarding so input on one
    /// session stays in call order without stalling other sessions.
    pub(crate) async fn state(&self, session_id: &str) -> Result<Arc<Mutex<CommandBoundaryState>>> {
        let states = self.states.read().await;
        states
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }
}

impl Default for CommandBoundaryTracker {
    fn default() -> Self {
        Self::new()
    }
}
