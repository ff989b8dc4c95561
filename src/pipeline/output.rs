//! Output Dispatch & Parsing Pipeline
//!
//! Fans process output out to subscribers, runs parser rules over it,
//! and keeps the history ledger fed. Delivery of raw output to
//! subscribers is the one guarantee nothing may break: parser failures
//! and history bookkeeping errors are logged and swallowed, never
//! allowed to hold a chunk back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::history::HistoryLedger;
use crate::host::ProcessHost;
use crate::models::{OutputChunk, ResolutionMethod};
use crate::registry::SessionRegistry;
use crate::rules::RuleRegistry;

/// Callback invoked for every chunk delivered to a subscriber
pub type ChunkCallback = Arc<dyn Fn(OutputChunk) + Send + Sync>;

type SubscriberMap = Arc<RwLock<HashMap<String, Vec<(u64, ChunkCallback)>>>>;

/// Handle returned by `subscribe`; call `unsubscribe` to stop delivery
pub struct Subscription {
    session_id: String,
    token: u64,
    subscribers: SubscriberMap,
}

impl Subscription {
    /// Session this subscription listens to
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Stop receiving chunks
    pub async fn unsubscribe(self) {
        let mut subscribers = self.subscribers.write().await;
        if let Some(list) = subscribers.get_mut(&self.session_id) {
            list.retain(|(token, _)| *token != self.token);
            if list.is_empty() {
                subscribers.remove(&self.session_id);
            }
        }
    }
}

/// Routes host output through capture, exit resolution, parsing, and
/// subscriber fan-out
pub struct OutputPipeline {
    host: Arc<dyn ProcessHost>,
    rules: Arc<RuleRegistry>,
    ledger: Arc<HistoryLedger>,
    registry: Arc<SessionRegistry>,
    subscribers: SubscriberMap,
    next_token: AtomicU64,
}

impl OutputPipeline {
    pub fn new(
        host: Arc<dyn ProcessHost>,
        rules: Arc<RuleRegistry>,
        ledger: Arc<HistoryLedger>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            host,
            rules,
            ledger,
            registry,
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            next_token: AtomicU64::new(1),
        }
    }

    /// Register a callback for a session's output. Multiple subscribers
    /// per session are supported; each sees chunks in emission order.
    pub async fn subscribe(
        &self,
        session_id: &str,
        callback: impl Fn(OutputChunk) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        // Require a known session so a typo'd id fails loudly instead
        // of listening forever
        self.registry.get(session_id).await?;

        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let mut subscribers = self.subscribers.write().await;
        subscribers
            .entry(session_id.to_string())
            .or_default()
            .push((token, Arc::new(callback)));

        Ok(Subscription {
            session_id: session_id.to_string(),
            token,
            subscribers: Arc::clone(&self.subscribers),
        })
    }

    /// Number of live subscriptions for a session
    pub async fn subscriber_count(&self, session_id: &str) -> usize {
        let subscribers = self.subscribers.read().await;
        subscribers.get(session_id).map(Vec::len).unwrap_or(0)
    }

    /// Drop every subscription for a session
    pub async fn remove_session(&self, session_id: &str) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.remove(session_id);
    }

    /// Process one chunk from the host. Capture, exit resolution, and
    /// parsers run first; delivery to subscribers happens last and
    /// happens unconditionally.
    pub async fn handle_chunk(&self, chunk: OutputChunk) {
        self.ledger.capture(&chunk.session_id, &chunk.content).await;

        if chunk.is_exit() {
            self.resolve_exit(&chunk.session_id).await;
        }

        self.run_parsers(&chunk).await;
        self.deliver(chunk).await;
    }

    /// Resolve a session's exit. The host is asked first; when it
    /// cannot answer, the pending command is finalized by scanning its
    /// captured output. The session record flips to Exited either way,
    /// carrying a code only when the host reported one.
    async fn resolve_exit(&self, session_id: &str) {
        match self.host.exit_code(session_id).await {
            Ok(Some(code)) => {
                if let Some(entry) = self
                    .ledger
                    .finalize(session_id, Some(code), ResolutionMethod::Authoritative)
                    .await
                {
                    debug!(
                        "Finalized '{}' on session {} with authoritative exit {}",
                        entry.command, session_id, code
                    );
                }
                if self.registry.mark_exited(session_id, Some(code)).await.is_err() {
                    debug!("Session {} gone before exit could be recorded", session_id);
                }
            }
            other => {
                if let Err(e) = other {
                    debug!("Exit query failed for session {}: {}", session_id, e);
                }
                if let Some(entry) = self.ledger.finalize_heuristic(session_id).await {
                    debug!(
                        "Finalized '{}' on session {} heuristically (exit {:?})",
                        entry.command, session_id, entry.exit_code
                    );
                }
                let _ = self.registry.mark_exited(session_id, None).await;
            }
        }
    }

    /// Run every parser rule whose pattern matches the chunk content.
    /// Handler errors are logged and do not stop later rules.
    async fn run_parsers(&self, chunk: &OutputChunk) {
        let parsers = self.rules.parsers().await;
        if parsers.is_empty() {
            return;
        }

        let session = match self.registry.get(&chunk.session_id).await {
            Ok(session) => session,
            Err(_) => {
                debug!(
                    "Skipping parsers for session {}; no longer registered",
                    chunk.session_id
                );
                return;
            }
        };

        for rule in parsers {
            if !rule.matches(&chunk.content) {
                continue;
            }
            if let Err(e) = rule.invoke(&chunk.content, &session) {
                warn!(
                    "Output parser '{}' failed on session {}: {}",
                    rule.pattern_str(),
                    chunk.session_id,
                    e
                );
            }
        }
    }

    async fn deliver(&self, chunk: OutputChunk) {
        let callbacks: Vec<ChunkCallback> = {
            let subscribers = self.subscribers.read().await;
            match subscribers.get(&chunk.session_id) {
                Some(list) => list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => return,
            }
        };

        // The lock is released before invoking callbacks so a callback
        // may subscribe or unsubscribe without deadlocking
        for callback in &callbacks {
            callback(chunk.clone());
        }
    }
}
