//! # Validation Run
//!
//! Drives one run end to end through strictly ordered phases:
//!
//! ```text
//! CRAWLING -> JOINED_ALL -> VALIDATING -> [REMEDIATING] -> REPORTING
//! ```
//!
//! Before crawling, the root folder is checked (exists, is a folder, is not
//! trashed) and every policy folder's name is resolved for the report.
//! Validation starts only after the crawl has joined and the registry has
//! been frozen, so it always sees the final merged domain sets.

use std::sync::Arc;

use chrono::Utc;
use dpol_core::{
    ConfigError, Item, ItemLister, PermissionMutator, PolicyStore, RetryPolicy, RunConfig,
    RunError,
};
use serde::Serialize;

use crate::crawler::{CrawlSummary, Crawler};
use crate::remediator::Remediator;
use crate::report::{Notification, RunReport, Setting};
use crate::session::CrawlSession;
use crate::validator::{Validator, Violation};

const DEFAULT_TITLE: &str = "Drive Policy Report";

/// Phases of a run, in the only order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Crawling,
    JoinedAll,
    Validating,
    Remediating,
    Reporting,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crawling => "CRAWLING",
            Self::JoinedAll => "JOINED_ALL",
            Self::Validating => "VALIDATING",
            Self::Remediating => "REMEDIATING",
            Self::Reporting => "REPORTING",
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    pub violations: Vec<Violation>,
    pub crawl: CrawlSummary,
    /// Phases entered, in order.
    pub phases: Vec<RunPhase>,
}

/// One configured validation run.
pub struct PolicyRun {
    config: RunConfig,
    policy: PolicyStore,
    lister: Arc<dyn ItemLister>,
    mutator: Arc<dyn PermissionMutator>,
    title: String,
    extra_settings: Vec<Setting>,
}

impl PolicyRun {
    pub fn new(
        config: RunConfig,
        policy: PolicyStore,
        lister: Arc<dyn ItemLister>,
        mutator: Arc<dyn PermissionMutator>,
    ) -> Self {
        Self {
            config,
            policy,
            lister,
            mutator,
            title: DEFAULT_TITLE.to_string(),
            extra_settings: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Settings appended to the report after the run configuration.
    pub fn with_settings(mut self, settings: Vec<Setting>) -> Self {
        self.extra_settings = settings;
        self
    }

    /// Execute every phase and return the report.
    ///
    /// Fails only on configuration errors (bad root) or authorization
    /// errors; everything else is contained and appears in the run log.
    pub async fn execute(self) -> Result<RunOutcome, RunError> {
        let PolicyRun {
            config,
            mut policy,
            lister,
            mutator,
            title,
            extra_settings,
        } = self;

        let mut session = CrawlSession::new();
        let mut phases = Vec::new();
        tracing::info!(run_id = %session.run_id(), root = %config.root_id, "run starting");

        for folder_id in policy.duplicate_folder_ids() {
            session.log().warn(format!(
                "Folder {folder_id} has more than one policy rule; the last one applies"
            ));
        }

        let root = fetch_root(lister.as_ref(), &config, &session).await?;
        resolve_policy_names(&mut policy, lister.as_ref(), &config.retry, &session).await?;
        let policy = Arc::new(policy);

        enter(&mut phases, RunPhase::Crawling);
        let crawl = Crawler::new(Arc::clone(&lister), Arc::clone(&policy), session.clone(), &config)
            .crawl(&root)
            .await?;

        enter(&mut phases, RunPhase::JoinedAll);
        session.log().info(format!(
            "API calls after crawl: {}",
            session.api_call_count()
        ));
        let registry = session
            .take_registry()
            .freeze()
            .map_err(|still_shared| RunError::PhaseOrder {
                phase: RunPhase::Validating.to_string(),
                detail: format!(
                    "{} crawl handles still hold the registry",
                    still_shared.handle_count() - 1
                ),
            })?;

        enter(&mut phases, RunPhase::Validating);
        let mut violations = Validator::new(config.scope).validate(&registry, session.log());

        let remediation = if config.remediate {
            enter(&mut phases, RunPhase::Remediating);
            let remediator = Remediator::new(mutator, config.retry, session.clone());
            Some(remediator.remediate(&mut violations).await)
        } else {
            None
        };

        enter(&mut phases, RunPhase::Reporting);
        session
            .log()
            .info(format!("API call count: {}", session.api_call_count()));

        let mut settings = config_settings(&config);
        settings.extend(extra_settings);

        let report = RunReport {
            title,
            run_id: session.run_id(),
            started_at: session.started_at(),
            finished_at: Utc::now(),
            settings,
            folder_policies: policy.rules().to_vec(),
            log: session.log().entries(),
            api_call_count: session.api_call_count(),
            items_crawled: registry.len(),
            branch_failures: crawl.branch_failures,
            violation_count: violations.len(),
            remediation,
            notifications: Notification::group(&violations),
        };

        tracing::info!(
            run_id = %report.run_id,
            items = report.items_crawled,
            violations = report.violation_count,
            api_calls = report.api_call_count,
            "run complete"
        );

        Ok(RunOutcome {
            report,
            violations,
            crawl,
            phases,
        })
    }
}

fn enter(phases: &mut Vec<RunPhase>, phase: RunPhase) {
    tracing::info!(phase = %phase, "entering phase");
    phases.push(phase);
}

fn config_settings(config: &RunConfig) -> Vec<Setting> {
    vec![
        Setting::new("root_id", &config.root_id),
        Setting::new("item_type", config.scope),
        Setting::new("fix", config.remediate),
        Setting::new("wait_seconds", config.child_delay.as_secs_f64()),
        Setting::new(
            "max_concurrent_listings",
            config
                .max_concurrent_listings
                .map_or_else(|| "unbounded".to_string(), |n| n.to_string()),
        ),
        Setting::new("retry_attempts", config.retry.max_attempts),
    ]
}

/// Fetch the root and check it can be crawled.
async fn fetch_root(
    lister: &dyn ItemLister,
    config: &RunConfig,
    session: &CrawlSession,
) -> Result<Item, RunError> {
    let root_id = &config.root_id;
    let result = config
        .retry
        .run("files.get", move || {
            session.record_api_call();
            lister.get_item(root_id)
        })
        .await;

    let root = match result {
        Ok(item) => item,
        Err(err) if err.is_authorization() => {
            return Err(RunError::Authorization {
                operation: format!("fetching root folder {root_id}"),
                source: err,
            });
        }
        Err(err) => {
            return Err(ConfigError::RootUnavailable {
                root: root_id.to_string(),
                reason: err.to_string(),
            }
            .into());
        }
    };

    if !root.is_folder() {
        return Err(ConfigError::RootNotFolder {
            root: root_id.to_string(),
        }
        .into());
    }
    if root.trashed {
        return Err(ConfigError::RootTrashed {
            root: root_id.to_string(),
        }
        .into());
    }
    Ok(root)
}

/// Fill in each rule's folder name for the report.
///
/// A rule whose folder cannot be fetched, is trashed, or names a file gets a
/// placeholder name and a warning; only an authorization failure is fatal.
async fn resolve_policy_names(
    policy: &mut PolicyStore,
    lister: &dyn ItemLister,
    retry: &RetryPolicy,
    session: &CrawlSession,
) -> Result<(), RunError> {
    for rule in policy.rules_mut() {
        let folder_id = &rule.folder_id;
        let result = retry
            .run("files.get", move || {
                session.record_api_call();
                lister.get_item(folder_id)
            })
            .await;

        rule.name = match result {
            Ok(item) if item.trashed => {
                session.log().warn(format!(
                    "Policy folder {folder_id} is trashed; its rule will not match any crawled folder"
                ));
                format!("Please specify an active folder; this folder is trashed: {folder_id}")
            }
            Ok(item) if item.is_folder() => item.name,
            Ok(_) => {
                session.log().warn(format!(
                    "Policy rule for {folder_id} names a file, not a folder; it only applies to folders"
                ));
                format!("Please specify a folder Id; this is a file Id: {folder_id}")
            }
            Err(err) if err.is_authorization() => {
                return Err(RunError::Authorization {
                    operation: format!("fetching policy folder {folder_id}"),
                    source: err,
                });
            }
            Err(err) => {
                session
                    .log()
                    .warn(format!("Unable to get policy folder {folder_id}: {err}"));
                format!("Unable to get folder: {err}")
            }
        };
    }
    Ok(())
}
