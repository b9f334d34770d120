//! # Run Report
//!
//! Everything a run produced, shaped for publishing: the settings it ran
//! with, the resolved folder policy table, the run log, counters, and one
//! notification per violating item listing its offending grants.
//!
//! Publishing goes through [`ReportSink`]. [`JsonReportSink`] writes the
//! report as JSON to any `io::Write`; other destinations implement the trait.

use std::io::Write;

use chrono::{DateTime, Utc};
use dpol_core::{GranteeKind, ItemId, Owner, PermissionId, PermittedDomains, PolicyRule};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::remediator::{FixOutcome, RemediationSummary};
use crate::session::LogEntry;
use crate::validator::Violation;

/// A named run setting, echoed into the report in the order given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Setting {
    pub name: String,
    pub value: String,
}

impl Setting {
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

/// One offending grant on a notified item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionNotice {
    pub permission_id: PermissionId,
    pub grantee: String,
    pub grantee_kind: GranteeKind,
    pub role: String,
    pub domain: String,
    /// `Success` / `Failure` when remediation ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<FixOutcome>,
}

/// All violations on one item, grouped for the item's owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub item_id: ItemId,
    pub name: String,
    pub url: String,
    pub item_type: String,
    pub owners: Vec<Owner>,
    pub permitted_domains: PermittedDomains,
    pub permissions: Vec<PermissionNotice>,
}

impl Notification {
    /// Group violations by item, keeping first-seen item order and the
    /// permission order within each item.
    pub fn group(violations: &[Violation]) -> Vec<Notification> {
        let mut grouped: Vec<Notification> = Vec::new();
        for v in violations {
            let notice = PermissionNotice {
                permission_id: v.permission_id.clone(),
                grantee: v.grantee_label.clone(),
                grantee_kind: v.grantee,
                role: v.role.clone(),
                domain: v.resolved_domain.clone(),
                response: v.fix,
            };
            match grouped.iter_mut().find(|n| n.item_id == v.item_id) {
                Some(existing) => existing.permissions.push(notice),
                None => grouped.push(Notification {
                    item_id: v.item_id.clone(),
                    name: v.item_name.clone(),
                    url: v.item_link.clone().unwrap_or_default(),
                    item_type: v.item_kind.label().to_string(),
                    owners: v.owners.clone(),
                    permitted_domains: v.permitted.clone(),
                    permissions: vec![notice],
                }),
            }
        }
        grouped
    }
}

/// The complete outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub title: String,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub settings: Vec<Setting>,
    pub folder_policies: Vec<PolicyRule>,
    pub log: Vec<LogEntry>,
    pub api_call_count: u64,
    pub items_crawled: usize,
    pub branch_failures: usize,
    pub violation_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<RemediationSummary>,
    pub notifications: Vec<Notification>,
}

impl RunReport {
    /// Whether any permission violated policy.
    pub fn has_violations(&self) -> bool {
        self.violation_count > 0
    }
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination for a finished report.
pub trait ReportSink {
    fn publish(&mut self, report: &RunReport) -> Result<(), ReportError>;
}

/// Writes the report as JSON followed by a newline.
pub struct JsonReportSink<W: Write> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonReportSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pretty: true,
        }
    }

    /// Single-line output, for log shippers.
    pub fn compact(writer: W) -> Self {
        Self {
            writer,
            pretty: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for JsonReportSink<W> {
    fn publish(&mut self, report: &RunReport) -> Result<(), ReportError> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, report)?;
        } else {
            serde_json::to_writer(&mut self.writer, report)?;
        }
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        tracing::info!(
            run_id = %report.run_id,
            notifications = report.notifications.len(),
            "report published"
        );
        Ok(())
    }
}
