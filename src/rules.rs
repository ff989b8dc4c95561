//! Interceptor and Parser Rule Registry
//!
//! Runtime-mutable rule sets for command interception and output
//! parsing. Rules pair a compiled regex with a handler value and are
//! evaluated strictly in registration order; the first interceptor
//! that claims a command short-circuits the rest. Pattern order
//! matters, so rules live in ordered lists, not maps.
//!
//! Pipelines iterate over snapshots taken under a read lock, so
//! concurrent add/remove calls are never observed mid-iteration.

use futures::future::BoxFuture;
use futures::FutureExt;
use regex::Regex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::Session;

/// What an interceptor handler decided about a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptOutcome {
    /// The handler claimed the command; the note becomes the history
    /// entry's captured output and nothing is forwarded to the host
    Intercepted(String),
    /// The handler declined; evaluation continues with the next rule
    PassThrough,
}

/// Boxed async interceptor handler over (command, session)
pub type InterceptorHandler =
    Arc<dyn Fn(String, Session) -> BoxFuture<'static, Result<InterceptOutcome>> + Send + Sync>;

/// Boxed parser callback over (content, session); side effects only
pub type ParserHandler = Arc<dyn Fn(&str, &Session) -> Result<()> + Send + Sync>;

/// A command-interception rule
#[derive(Clone)]
pub struct InterceptorRule {
    pattern: Regex,
    handler: InterceptorHandler,
}

impl InterceptorRule {
    /// Compile a pattern and wrap an async handler.
    /// Fails with `Error::Regex` on invalid pattern syntax.
    pub fn new<F, Fut>(pattern: &str, handler: F) -> Result<Self>
    where
        F: Fn(String, Session) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<InterceptOutcome>> + Send + 'static,
    {
        let pattern = Regex::new(pattern)?;
        let handler: InterceptorHandler =
            Arc::new(move |command, session| handler(command, session).boxed());
        Ok(Self { pattern, handler })
    }

    /// Canonical pattern string this rule was registered with
    pub fn pattern_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Check whether the rule applies to a command line
    pub fn matches(&self, command: &str) -> bool {
        self.pattern.is_match(command)
    }

    /// Run the handler
    pub(crate) async fn invoke(&self, command: &str, session: &Session) -> Result<InterceptOutcome> {
        (self.handler)(command.to_string(), session.clone()).await
    }
}

impl fmt::Debug for InterceptorRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorRule")
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// An output-parsing rule
#[derive(Clone)]
pub struct ParserRule {
    pattern: Regex,
    handler: ParserHandler,
}

impl ParserRule {
    /// Compile a pattern and wrap a parser callback.
    /// Fails with `Error::Regex` on invalid pattern syntax.
    pub fn new<F>(pattern: &str, handler: F) -> Result<Self>
    where
        F: Fn(&str, &Session) -> Result<()> + Send + Sync + 'static,
    {
        let pattern = Regex::new(pattern)?;
        Ok(Self {
            pattern,
            handler: Arc::new(handler),
        })
    }

    /// Canonical pattern string this rule was registered with
    pub fn pattern_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Check whether the rule applies to a chunk's content
    pub fn matches(&self, content: &str) -> bool {
        self.pattern.is_match(content)
    }

    /// Run the callback
    pub(crate) fn invoke(&self, content: &str, session: &Session) -> Result<()> {
        (self.handler)(content, session)
    }
}

impl fmt::Debug for ParserRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRule")
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Global registry of interceptor and parser rules.
///
/// Duplicate patterns are permitted and all of them fire; removal by
/// pattern takes every rule whose canonical string matches.
pub struct RuleRegistry {
    interceptors: RwLock<Vec<Arc<InterceptorRule>>>,
    parsers: RwLock<Vec<Arc<ParserRule>>>,
}

impl RuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            interceptors: RwLock::new(Vec::new()),
            parsers: RwLock::new(Vec::new()),
        }
    }

    /// Append an interceptor rule
    pub async fn add_interceptor(&self, rule: InterceptorRule) {
        let mut interceptors = self.interceptors.write().await;
        debug!("Registered interceptor pattern '{}'", rule.pattern_str());
        interceptors.push(Arc::new(rule));
    }

    /// Remove every interceptor registered with this exact pattern
    /// string; returns how many were removed
    pub async fn remove_interceptor(&self, pattern: &str) -> usize {
        let mut interceptors = self.interceptors.write().await;
        let before = interceptors.len();
        interceptors.retain(|rule| rule.pattern_str() != pattern);
        before - interceptors.len()
    }

    /// Append a parser rule
    pub async fn add_parser(&self, rule: ParserRule) {
        let mut parsers = self.parsers.write().await;
        debug!("Registered parser pattern '{}'", rule.pattern_str());
        parsers.push(Arc::new(rule));
    }

    /// Remove every parser registered with this exact pattern string;
    /// returns how many were removed
    pub async fn remove_parser(&self, pattern: &str) -> usize {
        let mut parsers = self.parsers.write().await;
        let before = parsers.len();
        parsers.retain(|rule| rule.pattern_str() != pattern);
        before - parsers.len()
    }

    /// Snapshot of interceptors in registration order
    pub async fn interceptors(&self) -> Vec<Arc<InterceptorRule>> {
        self.interceptors.read().await.clone()
    }

    /// Snapshot of parsers in registration order
    pub async fn parsers(&self) -> Vec<Arc<ParserRule>> {
        self.parsers.read().await.clone()
    }

    /// Number of registered interceptors
    pub async fn interceptor_count(&self) -> usize {
        self.interceptors.read().await.len()
    }

    /// Number of registered parsers
    pub async fn parser_count(&self) -> usize {
        self.parsers.read().await.len()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
