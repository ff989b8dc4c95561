//! Terminal Engine
//!
//! The facade the presentation layer talks to. Wires the session
//! registry, boundary tracker, rule registry, history ledger, and the
//! two pipelines around a process host, and runs one pump task per
//! session that drains host output into the output pipeline.
//!
//! ```no_run
//! use shellgate::{SessionConfig, TerminalEngine};
//!
//! # async fn example() -> shellgate::Result<()> {
//! let engine = TerminalEngine::new();
//! let session = engine.create_session(SessionConfig::default()).await?;
//!
//! let sub = engine
//!     .subscribe(&session.id, |chunk| print!("{}", chunk.content))
//!     .await?;
//! engine.send_input(&session.id, "echo hello\n").await?;
//! # let _ = sub;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::boundary::CommandBoundaryTracker;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::history::{HistoryFilter, HistoryLedger};
use crate::host::{ProcessHost, PtyProcessHost};
use crate::models::{
    HistoryEntry, OutputChunk, ResolutionMethod, Session, SessionConfig,
};
use crate::pipeline::{InputPipeline, OutputPipeline, Subscription};
use crate::registry::SessionRegistry;
use crate::rules::{InterceptOutcome, InterceptorRule, ParserRule, RuleRegistry};

/// Session and command interception engine
pub struct TerminalEngine {
    config: EngineConfig,
    host: Arc<dyn ProcessHost>,
    registry: Arc<SessionRegistry>,
    tracker: Arc<CommandBoundaryTracker>,
    rules: Arc<RuleRegistry>,
    ledger: Arc<HistoryLedger>,
    input: InputPipeline,
    output: Arc<OutputPipeline>,
    /// One output pump per live session
    pumps: Arc<RwLock<HashMap<String, JoinHandle<()>>>>,
}

impl TerminalEngine {
    /// Create an engine over real PTYs with default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine over real PTYs
    pub fn with_config(config: EngineConfig) -> Self {
        let host = Arc::new(PtyProcessHost::with_read_buffer(config.read_buffer_bytes));
        Self::with_host(config, host)
    }

    /// Create an engine over any process host. Tests use this with
    /// `MockProcessHost`.
    pub fn with_host(config: EngineConfig, host: Arc<dyn ProcessHost>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let tracker = Arc::new(CommandBoundaryTracker::new());
        let rules = Arc::new(RuleRegistry::new());
        let ledger = Arc::new(HistoryLedger::with_capture_cap(config.max_capture_bytes));

        let input = InputPipeline::new(
            Arc::clone(&host),
            Arc::clone(&tracker),
            Arc::clone(&rules),
            Arc::clone(&ledger),
            Arc::clone(&registry),
        );
        let output = Arc::new(OutputPipeline::new(
            Arc::clone(&host),
            Arc::clone(&rules),
            Arc::clone(&ledger),
            Arc::clone(&registry),
        ));

        Self {
            config,
            host,
            registry,
            tracker,
            rules,
            ledger,
            input,
            output,
            pumps: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Engine configuration in effect
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Spawn a shell session. Config fields left unset fall back to
    /// engine defaults.
    pub async fn create_session(&self, config: SessionConfig) -> Result<Session> {
        let spec = SessionRegistry::resolve_spec(&config, &self.config)?;
        let spawned = self.host.spawn(&spec).await?;

        let session = Session::new(
            spawned.id.clone(),
            spec.shell,
            spec.working_directory,
            spec.environment,
            spec.size,
            spawned.pid,
        );
        self.registry.insert(session.clone()).await;
        self.tracker.register(&session.id).await;
        self.start_pump(session.id.clone(), spawned.output).await;

        info!(
            "Created session {} ({}, {}x{})",
            session.id, session.shell, session.size.cols, session.size.rows
        );
        Ok(session)
    }

    /// Drain a session's host output into the output pipeline until the
    /// channel closes. A host that dies without an exit event gets one
    /// synthesized so the session never sticks in Running.
    async fn start_pump(
        &self,
        session_id: String,
        mut output: tokio::sync::mpsc::UnboundedReceiver<OutputChunk>,
    ) {
        let pipeline = Arc::clone(&self.output);
        let pumps = Arc::clone(&self.pumps);
        let id = session_id.clone();

        let handle = tokio::spawn(async move {
            let mut saw_exit = false;
            while let Some(chunk) = output.recv().await {
                saw_exit = chunk.is_exit();
                pipeline.handle_chunk(chunk).await;
            }
            if !saw_exit {
                debug!(
                    "Output channel for session {} closed without an exit event",
                    id
                );
                pipeline.handle_chunk(OutputChunk::exit(&id)).await;
            }
            pumps.write().await.remove(&id);
        });

        self.pumps.write().await.insert(session_id, handle);
    }

    /// Send input text to a session. Complete commands pass through the
    /// interceptor chain; partial input forwards verbatim.
    pub async fn send_input(&self, session_id: &str, text: &str) -> Result<()> {
        self.input.send_input(session_id, text).await
    }

    /// Subscribe to a session's output chunks
    pub async fn subscribe(
        &self,
        session_id: &str,
        callback: impl Fn(OutputChunk) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        self.output.subscribe(session_id, callback).await
    }

    /// Resize a session's terminal
    pub async fn resize(&self, session_id: &str, cols: u16, rows: u16) -> Result<()> {
        self.registry.get(session_id).await?;
        self.host.resize(session_id, cols, rows).await?;
        self.registry.update_size(session_id, cols, rows).await?;
        debug!("Resized session {} to {}x{}", session_id, cols, rows);
        Ok(())
    }

    /// Kill a session and drop everything associated with it. Killing
    /// an unknown or already-killed session is a no-op. A command still
    /// in flight is finalized with an Unknown resolution.
    pub async fn kill_session(&self, session_id: &str) -> Result<()> {
        let removed = self.registry.remove(session_id).await;
        let pump = self.pumps.write().await.remove(session_id);
        if removed.is_none() && pump.is_none() {
            debug!("Kill for unknown session {} is a no-op", session_id);
            return Ok(());
        }

        // Must precede host.kill: closing the output channel wakes the
        // pump, and the pending entry has to be gone before it looks
        if self
            .ledger
            .finalize(session_id, None, ResolutionMethod::Unknown)
            .await
            .is_some()
        {
            debug!("Killed session {} had a command in flight", session_id);
        }

        self.host.kill(session_id).await?;
        if let Some(handle) = pump {
            handle.abort();
        }
        self.tracker.remove(session_id).await;
        self.output.remove_session(session_id).await;

        info!("Killed session {}", session_id);
        Ok(())
    }

    /// Snapshot of one session
    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        self.registry.get(session_id).await
    }

    /// Snapshots of all sessions, newest first
    pub async fn list_sessions(&self) -> Vec<Session> {
        self.registry.list().await
    }

    /// Number of sessions still running
    pub async fn active_count(&self) -> usize {
        self.registry.active_count().await
    }

    /// Drop sessions that have exited, along with their boundary state
    /// and subscriptions. Returns how many were removed.
    pub async fn sweep_exited(&self) -> usize {
        let exited: Vec<String> = self
            .registry
            .list()
            .await
            .into_iter()
            .filter(|s| !s.is_running())
            .map(|s| s.id)
            .collect();

        for id in &exited {
            self.tracker.remove(id).await;
            self.output.remove_session(id).await;
            self.pumps.write().await.remove(id);
        }
        self.registry.remove_exited().await
    }

    /// Kill every session the engine knows about
    pub async fn shutdown(&self) {
        for session in self.registry.list().await {
            if let Err(e) = self.kill_session(&session.id).await {
                warn!("Shutdown kill failed for session {}: {}", session.id, e);
            }
        }
    }

    /// Query the history ledger
    pub async fn history(&self, filter: &HistoryFilter) -> Vec<HistoryEntry> {
        self.ledger.query(filter).await
    }

    /// Every finalized history entry, ordered by start time
    pub async fn history_all(&self) -> Vec<HistoryEntry> {
        self.ledger.entries().await
    }

    /// Clear history for one session, or all of it. Returns how many
    /// entries were dropped.
    pub async fn clear_history(&self, session_id: Option<&str>) -> usize {
        self.ledger.clear(session_id).await
    }

    /// Export the full history ledger as pretty-printed JSON
    pub async fn export_history_json(&self) -> Result<String> {
        self.ledger.export_json().await
    }

    /// Register a command interceptor. The pattern matches the full
    /// reconstructed command line.
    pub async fn add_interceptor<F, Fut>(&self, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(String, Session) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<InterceptOutcome>> + Send + 'static,
    {
        let rule = InterceptorRule::new(pattern, handler)?;
        self.rules.add_interceptor(rule).await;
        Ok(())
    }

    /// Remove every interceptor registered under a pattern. Returns how
    /// many were removed.
    pub async fn remove_interceptor(&self, pattern: &str) -> usize {
        self.rules.remove_interceptor(pattern).await
    }

    /// Register an output parser. The pattern matches chunk content.
    pub async fn add_parser<F>(&self, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(&str, &Session) -> Result<()> + Send + Sync + 'static,
    {
        let rule = ParserRule::new(pattern, handler)?;
        self.rules.add_parser(rule).await;
        Ok(())
    }

    /// Remove every parser registered under a pattern. Returns how many
    /// were removed.
    pub async fn remove_parser(&self, pattern: &str) -> usize {
        self.rules.remove_parser(pattern).await
    }
}

impl Default for TerminalEngine {
    fn default() -> Self {
        Self::new()
    }
}
