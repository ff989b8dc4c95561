//! Output Chunk Model
//!
//! A single unit of process output as emitted by the host. Chunks are
//! transient: consumed by subscribers and parsers, captured into the
//! history ledger while a command is pending, and not persisted beyond
//! that.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of output a chunk carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkKind {
    /// Regular output from the process
    Stdout,
    /// Error output, when the host distinguishes it (PTYs usually do not)
    Stderr,
    /// Terminal event: the process has exited; content may be empty
    Exit,
}

/// One unit of output from a session's process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputChunk {
    /// Session this chunk belongs to
    pub session_id: String,

    /// Chunk content; bytes are lossily decoded at the host edge
    pub content: String,

    /// What kind of output this is
    pub kind: ChunkKind,

    /// When the host emitted the chunk
    pub timestamp: DateTime<Utc>,
}

impl OutputChunk {
    /// Create a stdout chunk stamped now
    pub fn stdout(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            content: content.into(),
            kind: ChunkKind::Stdout,
            timestamp: Utc::now(),
        }
    }

    /// Create a stderr chunk stamped now
    pub fn stderr(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            content: content.into(),
            kind: ChunkKind::Stderr,
            timestamp: Utc::now(),
        }
    }

    /// Create an exit chunk stamped now
    pub fn exit(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            content: String::new(),
            kind: ChunkKind::Exit,
            timestamp: Utc::now(),
        }
    }

    /// Check if this chunk signals process exit
    pub fn is_exit(&self) -> bool {
        self.kind == ChunkKind::Exit
    }
}
