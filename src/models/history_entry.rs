//! History Entry Model
//!
//! A finalized record of one executed or intercepted command. Entries
//! are immutable once appended to the history ledger; the pending
//! (accumulating) stage lives inside the ledger itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a finalized entry's exit status was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ResolutionMethod {
    /// Host answered an exit-code query directly
    Authoritative,
    /// Exit status inferred by scanning captured output for failure text
    HeuristicFromOutput,
    /// No resolution ran (intercepted commands, killed sessions)
    #[default]
    Unknown,
}

/// A finalized command-execution record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Entry identifier
    pub id: String,

    /// Session the command was typed into
    pub session_id: String,

    /// The reconstructed command line
    pub command: String,

    /// When the command boundary fired
    pub started_at: DateTime<Utc>,

    /// Output captured between the boundary and finalization
    pub captured_output: String,

    /// Whether captured output was cut off at the capture cap
    pub truncated: bool,

    /// Milliseconds between boundary and finalization
    pub duration_ms: u64,

    /// Exit code, when one could be determined
    pub exit_code: Option<i32>,

    /// Whether an interceptor handled the command instead of the shell
    pub intercepted: bool,

    /// How the exit status was resolved
    pub resolution_method: ResolutionMethod,
}

impl HistoryEntry {
    /// Build a finalized entry; `started_at` comes from the pending stage
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn finalized(
        session_id: String,
        command: String,
        started_at: DateTime<Utc>,
        captured_output: String,
        truncated: bool,
        duration_ms: u64,
        exit_code: Option<i32>,
        intercepted: bool,
        resolution_method: ResolutionMethod,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id,
            command,
            started_at,
            captured_output,
            truncated,
            duration_ms,
            exit_code,
            intercepted,
            resolution_method,
        }
    }

    /// Check if the command completed with exit code zero
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Check if the command completed with a non-zero exit code
    pub fn is_failed(&self) -> bool {
        matches!(self.exit_code, Some(code) if code != 0)
    }
}
