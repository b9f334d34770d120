//! # Remediator
//!
//! Deletes violating permissions one at a time and records the outcome on
//! each violation. A failed deletion never stops the pass: the outcome is
//! recorded as [`FixOutcome::Failure`], a warning is logged, and the next
//! violation is processed.
//!
//! A delete that is retried after a transient failure may have gone through
//! on the server the first time. A 404 on a retry therefore means the grant
//! is already gone and is recorded as [`FixOutcome::Success`]. A 404 on the
//! first attempt is still a failure.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dpol_core::{ApiError, PermissionMutator, RetryPolicy};
use serde::Serialize;

use crate::session::CrawlSession;
use crate::validator::Violation;

/// Result of one deletion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FixOutcome {
    Success,
    Failure,
}

impl FixOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Failure => "Failure",
        }
    }
}

impl std::fmt::Display for FixOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Totals of a remediation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RemediationSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct Remediator {
    mutator: Arc<dyn PermissionMutator>,
    retry: RetryPolicy,
    session: CrawlSession,
}

impl Remediator {
    pub fn new(mutator: Arc<dyn PermissionMutator>, retry: RetryPolicy, session: CrawlSession) -> Self {
        Self {
            mutator,
            retry,
            session,
        }
    }

    /// Attempt to delete every violating permission, in order, setting
    /// `fix` on each violation.
    pub async fn remediate(&self, violations: &mut [Violation]) -> RemediationSummary {
        let mut summary = RemediationSummary::default();

        for violation in violations.iter_mut() {
            summary.attempted += 1;
            let mutator = &self.mutator;
            let session = &self.session;
            let (item_id, permission_id) = (&violation.item_id, &violation.permission_id);
            let attempts = AtomicU32::new(0);
            let attempts_ref = &attempts;

            let result = self
                .retry
                .run("permissions.delete", move || {
                    attempts_ref.fetch_add(1, Ordering::Relaxed);
                    session.record_api_call();
                    mutator.delete_permission(item_id, permission_id)
                })
                .await;

            let outcome = match result {
                Err(ApiError::NotFoundOrBadRequest { status: 404, .. })
                    if attempts.load(Ordering::Relaxed) > 1 =>
                {
                    summary.succeeded += 1;
                    session.log().info(format!(
                        "Permission {permission_id} on {item_id} was already gone when its delete was retried"
                    ));
                    FixOutcome::Success
                }
                Ok(()) => {
                    summary.succeeded += 1;
                    tracing::info!(
                        item_id = %item_id,
                        permission_id = %permission_id,
                        grantee = %violation.grantee_label,
                        "removed permission"
                    );
                    FixOutcome::Success
                }
                Err(err) => {
                    summary.failed += 1;
                    let hint = if err.is_authorization() {
                        "; the access token may lack write scope"
                    } else {
                        ""
                    };
                    session.log().warn(format!(
                        "Unable to remove permission {permission_id} ({}) from {item_id}: {err}{hint}",
                        violation.grantee_label
                    ));
                    FixOutcome::Failure
                }
            };
            violation.fix = Some(outcome);
        }

        tracing::info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "remediation complete"
        );
        summary
    }
}
