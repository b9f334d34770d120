//! # dpol-crawler — Hierarchy Crawl, Validation, and Remediation
//!
//! Runs a folder-sharing policy check over a storage hierarchy reached
//! through the [`dpol_core::ItemLister`] and [`dpol_core::PermissionMutator`]
//! seams.
//!
//! ## Pipeline
//!
//! | Stage        | Module           | Output                                  |
//! |--------------|------------------|-----------------------------------------|
//! | Crawl        | [`crawler`]      | Registry of items with inherited domains|
//! | Freeze       | [`registry`]     | Read-only [`FrozenRegistry`]            |
//! | Validate     | [`validator`]    | Ordered [`Violation`]s                  |
//! | Remediate    | [`remediator`]   | [`FixOutcome`] per violation            |
//! | Report       | [`report`]       | [`RunReport`] published to a sink       |
//!
//! [`PolicyRun`] sequences the stages; each one starts only after the
//! previous one has fully completed.
//!
//! ## Testing
//!
//! `fake::FakeDrive` is an in-memory hierarchy implementing both seams,
//! with scripted failures and call counters. It is compiled only for this
//! crate's tests and when the `test-util` feature is enabled.

pub mod crawler;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod registry;
pub mod remediator;
pub mod report;
pub mod run;
pub mod session;
pub mod validator;

pub use crawler::{CrawlSummary, Crawler};
pub use registry::{FrozenRegistry, ItemRecord, MergeOutcome, Registry};
pub use remediator::{FixOutcome, RemediationSummary, Remediator};
pub use report::{
    JsonReportSink, Notification, PermissionNotice, ReportError, ReportSink, RunReport, Setting,
};
pub use run::{PolicyRun, RunOutcome, RunPhase};
pub use session::{BranchFailure, CrawlSession, LogEntry, LogLevel, RunLog};
pub use validator::{Validator, Violation};
