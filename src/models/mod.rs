//! Core data models for Shellgate
//!
//! This module contains the core data structures that represent
//! the domain entities in Shellgate: sessions, output chunks, and
//! history entries.

pub mod history_entry;
pub mod output_chunk;
pub mod session;

// Re-exports for convenience
pub use history_entry::{HistoryEntry, ResolutionMethod};
pub use output_chunk::{ChunkKind, OutputChunk};
pub use session::{Session, SessionConfig, SessionStatus, TermSize};
