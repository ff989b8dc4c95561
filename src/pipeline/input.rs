//! Input Pipeline
//!
//! Routes caller-supplied input to the process host, watching the
//! stream for command boundaries. When a boundary completes a command,
//! interceptor rules get a chance to handle it locally; an intercepted
//! command is recorded in history and nothing of the fragment reaches
//! the host. Partial typing always forwards verbatim so echo and line
//! editing behave normally.

use std::sync::Arc;

use crate::boundary::CommandBoundaryTracker;
use crate::error::Result;
use crate::history::HistoryLedger;
use crate::host::ProcessHost;
use crate::models::Session;
use crate::registry::SessionRegistry;
use crate::rules::{InterceptOutcome, RuleRegistry};

/// Routes input fragments through boundary tracking and interception
pub struct InputPipeline {
    host: Arc<dyn ProcessHost>,
    tracker: Arc<CommandBoundaryTracker>,
    rules: Arc<RuleRegistry>,
    ledger: Arc<HistoryLedger>,
    registry: Arc<SessionRegistry>,
}

impl InputPipeline {
    pub fn new(
        host: Arc<dyn ProcessHost>,
        tracker: Arc<CommandBoundaryTracker>,
        rules: Arc<RuleRegistry>,
        ledger: Arc<HistoryLedger>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            host,
            tracker,
            rules,
            ledger,
            registry,
        }
    }

    /// Send an input fragment to a session.
    ///
    /// Holds the session's boundary lock from observation through
    /// forwarding, so concurrent calls on one session keep call order
    /// while other sessions proceed untouched. An async interceptor
    /// handler suspends forwarding for its session until it resolves.
    pub async fn send_input(&self, session_id: &str, fragment: &str) -> Result<()> {
        let session = self.registry.get(session_id).await?;
        let state = self.tracker.state(session_id).await?;
        let mut state = state.lock().await;

        let boundary = state.observe(fragment);

        if let Some(cmd) = boundary.command() {
            let cmd = cmd.to_string();
            self.ledger.begin(session_id, &cmd).await;

            if let Some(note) = self.run_interceptors(&cmd, &session).await {
                self.ledger.finalize_intercepted(session_id, note).await;
                info!(
                    "Intercepted command '{}' on session {}; nothing forwarded",
                    cmd, session_id
                );
                return Ok(());
            }
        }

        // Forward the full fragment unchanged, terminator included. An
        // empty boundary (bare newline) is not a command but the shell
        // still gets the keystroke.
        self.host.write(session_id, fragment.as_bytes()).await
    }

    /// Evaluate interceptor rules in registration order. Returns the
    /// first handler's note on interception, None when the command
    /// should forward. A failing handler counts as non-interception so
    /// input is never silently dropped.
    async fn run_interceptors(&self, cmd: &str, session: &Session) -> Option<String> {
        let interceptors = self.rules.interceptors().await;
        for rule in interceptors {
            if !rule.matches(cmd) {
                continue;
            }
            match rule.invoke(cmd, session).await {
                Ok(InterceptOutcome::Intercepted(note)) => return Some(note),
                Ok(InterceptOutcome::PassThrough) => {}
                Err(e) => {
                    warn!(
                        "Interceptor '{}' failed on session {}: {}; treating as pass-through",
                        rule.pattern_str(),
                        session.id,
                        e
                    );
                }
            }
        }
        None
    }
}
