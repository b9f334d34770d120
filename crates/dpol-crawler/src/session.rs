//! # Crawl Session
//!
//! Per-run shared state handed to every crawl task: the item registry, the
//! external call counter, and the run log that ends up in the report.
//!
//! A [`CrawlSession`] is a bundle of cheap handles. Cloning it shares the
//! same registry, counter, and log.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dpol_core::{ApiError, ItemId};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::registry::Registry;

// ---------------------------------------------------------------------------
// Run log
// ---------------------------------------------------------------------------

/// Severity of a run-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
}

/// One line of the run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Append-only, shared run log.
///
/// Every entry is also emitted through `tracing` so operators see it live;
/// the collected entries are copied into the run report.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        self.push(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.push(LogLevel::Warning, message);
    }

    fn push(&self, level: LogLevel, message: String) {
        self.entries.lock().push(LogEntry {
            at: Utc::now(),
            level,
            message,
        });
    }

    /// Copy of every entry so far, in insertion order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn warning_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == LogLevel::Warning)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Branch failures
// ---------------------------------------------------------------------------

/// A folder whose listing failed non-fatally. Its unlisted descendants are
/// missing from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchFailure {
    pub folder_id: ItemId,
    pub error: ApiError,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Shared state of one validation run.
#[derive(Debug, Clone)]
pub struct CrawlSession {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    registry: Registry,
    api_calls: Arc<AtomicU64>,
    log: RunLog,
    branch_failures: Arc<Mutex<Vec<BranchFailure>>>,
}

impl Default for CrawlSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlSession {
    /// Start a new session with an empty registry and a fresh run id.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            registry: Registry::new(),
            api_calls: Arc::new(AtomicU64::new(0)),
            log: RunLog::new(),
            branch_failures: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    /// Count one external call attempt.
    pub fn record_api_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn api_call_count(&self) -> u64 {
        self.api_calls.load(Ordering::Relaxed)
    }

    pub fn record_branch_failure(&self, folder_id: ItemId, error: ApiError) {
        self.log.warn(format!(
            "Unable to list children of folder {folder_id}; its subtree is incomplete: {error}"
        ));
        self.branch_failures
            .lock()
            .push(BranchFailure { folder_id, error });
    }

    pub fn branch_failures(&self) -> Vec<BranchFailure> {
        self.branch_failures.lock().clone()
    }

    /// Detach the registry from this session, leaving an empty one behind.
    ///
    /// The returned handle can be frozen once every crawl task holding a
    /// clone of this session has finished.
    pub fn take_registry(&mut self) -> Registry {
        std::mem::take(&mut self.registry)
    }
}
