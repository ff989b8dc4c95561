//! Shellgate - a terminal session and command interception engine
//!
//! This library runs interactive shell sessions behind pseudoterminals,
//! tracks command boundaries in the raw input stream, and lets embedders
//! intercept commands or parse output through pluggable regex rules.
//! Every command is recorded in a queryable history ledger.
//!
//! ## Features
//!
//! - **Session Management:** Spawn, resize, kill, and enumerate shell sessions
//! - **PTY Support:** Cross-platform pseudoterminal via `portable-pty`
//! - **Command Boundaries:** Byte-accurate boundary tracking (CR, LF, CRLF, backspace)
//! - **Interception:** Regex-matched interceptor rules that can suppress a command
//! - **Output Parsing:** Observe-only parser rules over session output
//! - **History Ledger:** Per-command records with captured output and exit codes
//! - **Configuration:** TOML-based engine configuration
//!
//! ## Module Organization
//!
//! ### Core Functionality
//!
//! - [`engine`] - The [`TerminalEngine`] facade tying everything together
//! - [`host`] - Process host abstraction: real PTY and in-memory mock
//! - [`boundary`] - Command boundary tracking over raw input fragments
//! - [`pipeline`] - Input interception and output dispatch pipelines
//! - [`mod@error`] - Error types and Result alias
//!
//! ### Bookkeeping
//!
//! - [`registry`] - Shared session registry
//! - [`history`] - Execution history ledger and exit-code heuristics
//! - [`rules`] - Interceptor and parser rule registry
//!
//! ### Support
//!
//! - [`models`] - Data structures (Session, OutputChunk, HistoryEntry)
//! - [`config`] - Engine configuration loading and validation
//!
//! ## Quick Start
//!
//! ```no_run
//! use shellgate::{InterceptOutcome, SessionConfig, TerminalEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = TerminalEngine::new();
//!
//!     // Block `rm -rf` before the shell ever sees it.
//!     engine
//!         .add_interceptor(r"^rm\s+-rf", |cmd, _session| async move {
//!             Ok(InterceptOutcome::Intercepted(format!("blocked: {}", cmd)))
//!         })
//!         .await?;
//!
//!     let session = engine.create_session(SessionConfig::default()).await?;
//!     engine.send_input(&session.id, "echo hello\n").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Shellgate uses a hybrid threading model:
//!
//! - **Tokio Tasks:** One pump task per session drains host output into
//!   the output pipeline
//! - **PTY Reader Threads:** Read output from PTY processes (blocking I/O)
//! - **PTY Writer Threads:** Write input to PTY processes (blocking I/O)
//!
//! Communication between threads happens via channels (`tokio::mpsc` for
//! output, `std::sync::mpsc` for input).
//!
//! ## Safety and Reliability
//!
//! - **No Panics:** All fallible operations return `Result`
//! - **Memory Limits:** Per-command capture caps prevent OOM on chatty commands
//! - **Delivery Guarantee:** Subscribers receive every chunk even when
//!   capture or parsing fails
//! - **Graceful Degradation:** Falls back to defaults when config loading fails

#![allow(unexpected_cfgs)]

#[macro_use]
extern crate tracing;

pub mod config;
pub mod error;

// Core modules
pub mod boundary;
pub mod engine;
pub mod host;
pub mod pipeline;

// Bookkeeping modules
pub mod history;
pub mod registry;
pub mod rules;

// Model modules
pub mod models;

// Re-exports for core functionality
pub use config::EngineConfig;
pub use engine::TerminalEngine;
pub use error::{Error, Result};

// Convenience re-exports for common types
pub use boundary::{BoundaryResult, CommandBoundaryState, CommandBoundaryTracker};
pub use history::{HistoryFilter, HistoryLedger};
pub use host::{MockProcessHost, ProcessHost, PtyProcessHost, SpawnSpec, SpawnedSession};
pub use models::{
    ChunkKind, HistoryEntry, OutputChunk, ResolutionMethod, Session, SessionConfig, SessionStatus,
    TermSize,
};
pub use pipeline::{ChunkCallback, InputPipeline, OutputPipeline, Subscription};
pub use registry::SessionRegistry;
pub use rules::{InterceptOutcome, InterceptorRule, ParserRule, RuleRegistry};

// Version information
/// The current version of Shellgate from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The library name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// The library description from Cargo.toml
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Initialize an engine with configuration from the default location
///
/// Loads `EngineConfig` from the default config path, falling back to
/// defaults when no file exists or loading fails, and builds a
/// [`TerminalEngine`] backed by the real PTY host.
///
/// # Examples
///
/// ```no_run
/// use shellgate::init;
///
/// match init() {
///     Ok(_engine) => println!("engine ready"),
///     Err(e) => eprintln!("initialization failed: {}", e),
/// }
/// ```
pub fn init() -> Result<TerminalEngine> {
    info!("Initializing {} v{}", NAME, VERSION);

    let config = match EngineConfig::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load configuration: {}. Using defaults", e);
            EngineConfig::default()
        }
    };

    Ok(TerminalEngine::with_config(config))
}

/// Initialize an engine from a specific configuration file
///
/// Unlike [`init`], a missing or invalid file is an error here: an
/// embedder that names a config file expects it to be honored.
pub fn init_with_config(config_path: &std::path::Path) -> Result<TerminalEngine> {
    info!(
        "Initializing {} v{} with config: {}",
        NAME,
        VERSION,
        config_path.display()
    );

    if !config_path.exists() {
        return Err(Error::ConfigLoadFailed {
            path: config_path.to_path_buf(),
            reason: "Configuration file does not exist".to_string(),
        });
    }

    let config = EngineConfig::load_from_file(config_path)?;
    Ok(TerminalEngine::with_config(config))
}

/// Get default configuration
///
/// Returns an `EngineConfig` with all default values. Useful for tests
/// or for inspecting the defaults before overriding them.
///
/// # Examples
///
/// ```
/// use shellgate::default_config;
///
/// let config = default_config();
/// assert_eq!(config.default_cols, 80);
/// ```
pub fn default_config() -> EngineConfig {
    EngineConfig::default()
}
