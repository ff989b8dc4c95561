//! History Ledger
//!
//! Append-only record of executed and intercepted commands, globally
//! ordered by start time. The ledger also owns the per-session pending
//! stage: a command entry opens when its boundary fires, accumulates
//! output, and is finalized exactly once (on process exit, on the next
//! boundary, on interception, or when the session is killed). Pending
//! state is keyed strictly by session id.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::config::DEFAULT_MAX_CAPTURE_BYTES;
use crate::error::Result;
use crate::models::{HistoryEntry, ResolutionMethod};

/// Failure-indicating output patterns for heuristic exit resolution,
/// scanned in order, case-insensitive. The list is intentionally fuzzy
/// and can misread legitimate output ("failed" in a success message);
/// entries resolved this way carry `ResolutionMethod::HeuristicFromOutput`
/// so callers can discount them.
static FAILURE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        "not recognized as.*command",
        "command not found",
        "permission denied",
        "access denied",
        "no such file or directory",
        "file not found",
        "error:",
        "failed",
        "cannot",
        "unable to",
    ]
    .iter()
    .filter_map(|pattern| match Regex::new(&format!("(?i){}", pattern)) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Skipping failure pattern '{}': {}", pattern, e);
            None
        }
    })
    .collect()
});

/// Check captured output for failure-indicating text
pub fn output_indicates_failure(output: &str) -> bool {
    FAILURE_PATTERNS.iter().any(|re| re.is_match(output))
}

/// Heuristic exit code from captured output: 1 on any failure pattern
/// match, 0 otherwise
pub fn heuristic_exit_code(output: &str) -> i32 {
    if output_indicates_failure(output) {
        1
    } else {
        0
    }
}

/// A command that has fired its boundary but is not yet finalized
#[derive(Debug)]
struct PendingCommand {
    session_id: String,
    command: String,
    started_at: DateTime<Utc>,
    started_instant: Instant,
    captured: String,
    truncated: bool,
}

impl PendingCommand {
    fn new(session_id: &str, command: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            command: command.to_string(),
            started_at: Utc::now(),
            started_instant: Instant::now(),
            captured: String::new(),
            truncated: false,
        }
    }

    fn push_output(&mut self, content: &str, cap: usize) {
        if self.truncated {
            return;
        }
        let remaining = cap.saturating_sub(self.captured.len());
        if content.len() <= remaining {
            self.captured.push_str(content);
        } else {
            // Cut on a char boundary; the cap is a byte budget
            let mut cut = remaining;
            while cut > 0 && !content.is_char_boundary(cut) {
                cut -= 1;
            }
            self.captured.push_str(&content[..cut]);
            self.truncated = true;
            warn!(
                "Output capture cap reached for session {} (command '{}')",
                self.session_id, self.command
            );
        }
    }

    fn into_entry(
        self,
        exit_code: Option<i32>,
        resolution: ResolutionMethod,
        intercepted: bool,
    ) -> HistoryEntry {
        let duration_ms = self.started_instant.elapsed().as_millis() as u64;
        HistoryEntry::finalized(
            self.session_id,
            self.command,
            self.started_at,
            self.captured,
            self.truncated,
            duration_ms,
            exit_code,
            intercepted,
            resolution,
        )
    }
}

/// Query filter for ledger reads; all fields optional and conjunctive
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Only entries from this session
    pub session_id: Option<String>,
    /// Only entries whose command contains this substring
    pub command_contains: Option<String>,
    /// Only intercepted (true) or only forwarded (false) commands
    pub intercepted: Option<bool>,
    /// Only entries started at or after this time
    pub since: Option<DateTime<Utc>>,
    /// Only entries started at or before this time
    pub until: Option<DateTime<Utc>>,
}

impl HistoryFilter {
    /// Filter down to one session
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Default::default()
        }
    }

    fn matches(&self, entry: &HistoryEntry) -> bool {
        if let Some(session_id) = &self.session_id {
            if &entry.session_id != session_id {
                return false;
            }
        }
        if let Some(needle) = &self.command_contains {
            if !entry.command.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(intercepted) = self.intercepted {
            if entry.intercepted != intercepted {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.started_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.started_at > until {
                return false;
            }
        }
        true
    }
}

/// Append-only ledger of finalized command records
pub struct HistoryLedger {
    pending: RwLock<HashMap<String, PendingCommand>>,
    entries: RwLock<Vec<HistoryEntry>>,
    max_capture_bytes: usize,
}

impl HistoryLedger {
    /// Create a ledger with the default capture cap
    pub fn new() -> Self {
        Self::with_capture_cap(DEFAULT_MAX_CAPTURE_BYTES)
    }

    /// Create a ledger with a specific per-command capture cap
    pub fn with_capture_cap(max_capture_bytes: usize) -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
            entries: RwLock::new(Vec::new()),
            max_capture_bytes,
        }
    }

    /// Open a pending entry for a freshly completed boundary. If the
    /// session already has one, the old entry is finalized first by the
    /// output heuristic: the shell is still running at a boundary, so
    /// an authoritative exit query cannot answer for the old command.
    pub(crate) async fn begin(&self, session_id: &str, command: &str) {
        let previous = {
            let mut pending = self.pending.write().await;
            let previous = pending.remove(session_id);
            pending.insert(
                session_id.to_string(),
                PendingCommand::new(session_id, command),
            );
            previous
        };

        if let Some(prev) = previous {
            let exit_code = heuristic_exit_code(&prev.captured);
            debug!(
                "Boundary finalized previous command '{}' for session {} (heuristic exit {})",
                prev.command, session_id, exit_code
            );
            self.append(prev.into_entry(
                Some(exit_code),
                ResolutionMethod::HeuristicFromOutput,
                false,
            ))
            .await;
        }
    }

    /// Append output to the session's pending entry, if one exists
    pub(crate) async fn capture(&self, session_id: &str, content: &str) {
        let mut pending = self.pending.write().await;
        if let Some(entry) = pending.get_mut(session_id) {
            entry.push_output(content, self.max_capture_bytes);
        }
    }

    /// Finalize the pending entry with an explicit exit status. Returns
    /// None when the session has nothing pending, which makes every
    /// finalization path exactly-once under exit/kill races.
    pub(crate) async fn finalize(
        &self,
        session_id: &str,
        exit_code: Option<i32>,
        resolution: ResolutionMethod,
    ) -> Option<HistoryEntry> {
        let taken = self.pending.write().await.remove(session_id)?;
        let entry = taken.into_entry(exit_code, resolution, false);
        self.append(entry.clone()).await;
        Some(entry)
    }

    /// Finalize the pending entry by scanning its captured output
    pub(crate) async fn finalize_heuristic(&self, session_id: &str) -> Option<HistoryEntry> {
        let taken = self.pending.write().await.remove(session_id)?;
        let exit_code = heuristic_exit_code(&taken.captured);
        let entry = taken.into_entry(
            Some(exit_code),
            ResolutionMethod::HeuristicFromOutput,
            false,
        );
        self.append(entry.clone()).await;
        Some(entry)
    }

    /// Finalize the pending entry as intercepted; the handler's note
    /// becomes the captured output and no exit status applies
    pub(crate) async fn finalize_intercepted(
        &self,
        session_id: &str,
        note: String,
    ) -> Option<HistoryEntry> {
        let mut taken = self.pending.write().await.remove(session_id)?;
        taken.captured = note;
        taken.truncated = false;
        let entry = taken.into_entry(None, ResolutionMethod::Unknown, true);
        self.append(entry.clone()).await;
        Some(entry)
    }

    /// Check whether a session has a pending entry
    pub async fn has_pending(&self, session_id: &str) -> bool {
        self.pending.read().await.contains_key(session_id)
    }

    /// All finalized entries matching the filter, in start-time order
    pub async fn query(&self, filter: &HistoryFilter) -> Vec<HistoryEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    /// All finalized entries, in start-time order
    pub async fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.read().await.clone()
    }

    /// Erase finalized entries, either for one session or everywhere.
    /// Pending entries are untouched; they are not history yet.
    pub async fn clear(&self, session_id: Option<&str>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        match session_id {
            Some(id) => entries.retain(|entry| entry.session_id != id),
            None => entries.clear(),
        }
        before - entries.len()
    }

    /// Number of finalized entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if the ledger has no finalized entries
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Export all finalized entries as pretty-printed JSON
    pub async fn export_json(&self) -> Result<String> {
        let entries = self.entries.read().await;
        Ok(serde_json::to_string_pretty(&*entries)?)
    }

    /// Insert preserving global start-time order
    async fn append(&self, entry: HistoryEntry) {
        let mut entries = self.entries.write().await;
        let idx = entries.partition_point(|e| e.started_at <= entry.started_at);
        entries.insert(idx, entry);
    }
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new()
    }
}
