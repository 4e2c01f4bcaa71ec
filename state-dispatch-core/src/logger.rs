//! Action logging with pattern-based filtering and in-memory storage
//!
//! [`ActionLoggerMiddleware`] traces dispatched actions through `tracing` and
//! can keep the most recent dispatches, with their outcome, in a ring buffer.
//! Glob patterns over action names decide what gets logged.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use state_dispatch_core::{ActionLogConfig, ActionLoggerConfig, ActionLoggerMiddleware};
//!
//! // Log everything except the `tick*` family, keep the last 50 dispatches
//! let filter = ActionLoggerConfig::new(None, Some("tick*"));
//! let logger = Arc::new(ActionLoggerMiddleware::with_log(ActionLogConfig::new(50, filter)));
//!
//! // Hand a clone to `Store::builder().middleware(..)`, keep this one to read
//! let recent: Vec<_> = logger.recent(10);
//! assert!(recent.is_empty());
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::{ErrorKind, StoreError};
use crate::middleware::Middleware;

/// Configuration for action logging with glob pattern filtering.
///
/// Patterns support:
/// - `*` matches any sequence of characters
/// - `?` matches any single character
/// - Literal text matches exactly
///
/// # Examples
///
/// - `todo*` matches todoAdd, todoRemove, etc.
/// - `*Error*` matches any action containing "Error"
/// - `reset` matches only reset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionLoggerConfig {
    /// If non-empty, only log actions matching these patterns
    pub include_patterns: Vec<String>,
    /// Exclude actions matching these patterns (applied after include)
    pub exclude_patterns: Vec<String>,
}

impl ActionLoggerConfig {
    /// Create a new config from comma-separated pattern strings
    ///
    /// # Example
    /// ```
    /// use state_dispatch_core::ActionLoggerConfig;
    ///
    /// let config = ActionLoggerConfig::new(Some("increment*,reset"), Some("incrementBy?"));
    /// assert!(config.should_log("increment"));
    /// assert!(config.should_log("reset"));
    /// assert!(!config.should_log("incrementBy2"));
    /// assert!(!config.should_log("decrement"));
    /// ```
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include_patterns: include.map(split_patterns).unwrap_or_default(),
            exclude_patterns: exclude.map(split_patterns).unwrap_or_default(),
        }
    }

    pub fn with_patterns(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include_patterns: include,
            exclude_patterns: exclude,
        }
    }

    /// Parse a config embedded in a JSON document. Missing fields default to empty.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Check if an action name should be logged based on include/exclude patterns
    pub fn should_log(&self, action_name: &str) -> bool {
        if !self.include_patterns.is_empty()
            && !self
                .include_patterns
                .iter()
                .any(|p| glob_match(p, action_name))
        {
            return false;
        }

        !self
            .exclude_patterns
            .iter()
            .any(|p| glob_match(p, action_name))
    }
}

fn split_patterns(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// In-Memory Action Log
// ============================================================================

/// How a logged dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Reduced on `selector`; `changed` is false when the reducer returned an equal state.
    Reduced { selector: String, changed: bool },
    Failed(ErrorKind),
}

/// An entry in the action log
#[derive(Debug, Clone)]
pub struct ActionLogEntry {
    pub name: String,
    pub outcome: DispatchOutcome,
    pub timestamp: Instant,
    /// Sequence number for ordering
    pub sequence: u64,
}

impl ActionLogEntry {
    pub fn new(name: impl Into<String>, outcome: DispatchOutcome, sequence: u64) -> Self {
        Self {
            name: name.into(),
            outcome,
            timestamp: Instant::now(),
            sequence,
        }
    }

    pub fn selector(&self) -> Option<&str> {
        match &self.outcome {
            DispatchOutcome::Reduced { selector, .. } => Some(selector),
            DispatchOutcome::Failed(_) => None,
        }
    }

    pub fn state_changed(&self) -> Option<bool> {
        match self.outcome {
            DispatchOutcome::Reduced { changed, .. } => Some(changed),
            DispatchOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<ErrorKind> {
        match self.outcome {
            DispatchOutcome::Failed(kind) => Some(kind),
            DispatchOutcome::Reduced { .. } => None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }

    /// Format the elapsed time for display (e.g., "2.3s", "150ms")
    pub fn elapsed_display(&self) -> String {
        let elapsed = self.elapsed();
        if elapsed.as_secs() >= 1 {
            format!("{:.1}s", elapsed.as_secs_f64())
        } else {
            format!("{}ms", elapsed.as_millis())
        }
    }
}

/// Configuration for the action log ring buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionLogConfig {
    /// Maximum number of entries to keep
    pub capacity: usize,
    pub filter: ActionLoggerConfig,
}

impl Default for ActionLogConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            filter: ActionLoggerConfig::default(),
        }
    }
}

impl ActionLogConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn new(capacity: usize, filter: ActionLoggerConfig) -> Self {
        Self { capacity, filter }
    }
}

/// In-memory ring buffer of recent dispatches.
///
/// Older entries are discarded once capacity is reached.
#[derive(Debug, Clone)]
pub struct ActionLog {
    entries: VecDeque<ActionLogEntry>,
    config: ActionLogConfig,
    next_sequence: u64,
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new(ActionLogConfig::default())
    }
}

impl ActionLog {
    pub fn new(config: ActionLogConfig) -> Self {
        Self {
            entries: VecDeque::with_capacity(config.capacity),
            config,
            next_sequence: 0,
        }
    }

    /// Record a dispatch if its action passes the filter.
    ///
    /// Returns the entry if it was logged, None if filtered out.
    pub fn record(&mut self, name: &str, outcome: DispatchOutcome) -> Option<&ActionLogEntry> {
        if self.config.capacity == 0 || !self.config.filter.should_log(name) {
            return None;
        }

        let entry = ActionLogEntry::new(name, outcome, self.next_sequence);
        self.next_sequence += 1;

        if self.entries.len() >= self.config.capacity {
            self.entries.pop_front();
        }

        self.entries.push_back(entry);
        self.entries.back()
    }

    /// Get all entries (oldest first)
    pub fn entries(&self) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter()
    }

    /// Get the most recent N entries (newest first)
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter().rev().take(count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn config(&self) -> &ActionLogConfig {
        &self.config
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Middleware that logs dispatched actions with configurable pattern filtering.
///
/// Supports two modes:
/// - **Tracing only** (default): logs via `tracing::debug!()`
/// - **With storage**: also records each dispatch and its outcome in an
///   [`ActionLog`] ring buffer
///
/// Wrap it in an `Arc` to keep a handle for reading the log after handing it
/// to the store.
#[derive(Debug)]
pub struct ActionLoggerMiddleware {
    config: ActionLoggerConfig,
    log: Option<Mutex<ActionLog>>,
    /// When false, all hooks are no-ops.
    active: bool,
}

impl ActionLoggerMiddleware {
    /// Tracing only, no in-memory storage
    pub fn new(config: ActionLoggerConfig) -> Self {
        Self {
            config,
            log: None,
            active: true,
        }
    }

    pub fn with_log(config: ActionLogConfig) -> Self {
        Self {
            config: config.filter.clone(),
            log: Some(Mutex::new(ActionLog::new(config))),
            active: true,
        }
    }

    pub fn with_default_log() -> Self {
        Self::with_log(ActionLogConfig::default())
    }

    /// No filtering, tracing only
    pub fn log_all() -> Self {
        Self::new(ActionLoggerConfig::default())
    }

    /// Set whether the middleware is active.
    ///
    /// ```ignore
    /// let logger = ActionLoggerMiddleware::log_all().active(args.debug);
    /// ```
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn config(&self) -> &ActionLoggerConfig {
        &self.config
    }

    pub fn has_log(&self) -> bool {
        self.log.is_some()
    }

    /// Copies of the most recent `count` entries, newest first.
    ///
    /// Empty when storage is disabled.
    pub fn recent(&self, count: usize) -> Vec<ActionLogEntry> {
        self.log
            .as_ref()
            .map(|log| log.lock().recent(count).cloned().collect())
            .unwrap_or_default()
    }

    /// Run `f` against the action log, if storage is enabled.
    pub fn with_action_log<R>(&self, f: impl FnOnce(&ActionLog) -> R) -> Option<R> {
        self.log.as_ref().map(|log| f(&log.lock()))
    }

    pub fn clear(&self) {
        if let Some(log) = &self.log {
            log.lock().clear();
        }
    }

    fn record(&self, action: &Action, outcome: DispatchOutcome) {
        if let Some(log) = &self.log {
            log.lock().record(action.name(), outcome);
        }
    }
}

impl Middleware for ActionLoggerMiddleware {
    fn before(&self, action: &Action) {
        if !self.active || !self.config.should_log(action.name()) {
            return;
        }
        tracing::debug!(
            action = %action.name(),
            payload = action.has_payload(),
            "dispatching action"
        );
    }

    fn after(&self, action: &Action, selector: &str, state_changed: bool) {
        if !self.active {
            return;
        }
        if self.config.should_log(action.name()) {
            tracing::debug!(
                action = %action.name(),
                selector = %selector,
                state_changed,
                "action processed"
            );
        }
        self.record(
            action,
            DispatchOutcome::Reduced {
                selector: selector.to_string(),
                changed: state_changed,
            },
        );
    }

    fn failed(&self, action: &Action, error: &StoreError) {
        if !self.active {
            return;
        }
        if self.config.should_log(action.name()) {
            tracing::debug!(action = %action.name(), error = %error, "action failed");
        }
        self.record(action, DispatchOutcome::Failed(error.kind()));
    }
}

/// Simple glob pattern matching supporting `*` and `?`.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < text.len() {
        match pattern.get(pi).copied() {
            Some('*') => {
                backtrack = Some((pi, ti));
                pi += 1;
            }
            Some(c) if c == '?' || c == text[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match backtrack {
                // Let the last star swallow one more character
                Some((star_pi, star_ti)) => {
                    pi = star_pi + 1;
                    ti = star_ti + 1;
                    backtrack = Some((star_pi, star_ti + 1));
                }
                None => return false,
            },
        }
    }

    pattern[pi..].iter().all(|&c| c == '*')
}
