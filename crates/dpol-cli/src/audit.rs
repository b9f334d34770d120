//! # Audit Run
//!
//! Wires the command-line flags, the Drive client, and the policy file into
//! a [`PolicyRun`], then publishes the report.
//!
//! Exit codes: 0 when no permission violates policy, 1 when violations were
//! found (fixed or not), 2 when the run could not complete.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use dpol_core::{ItemLister, ItemScope, PermissionMutator, PolicyStore, RetryPolicy, RunConfig};
use dpol_crawler::{JsonReportSink, PolicyRun, ReportSink, RunReport, Setting};
use dpol_drive_client::{DriveApiConfig, DriveClient};

use crate::policy_file::load_policy;

/// Flags of a validation run.
#[derive(Args, Debug, Clone)]
pub struct AuditArgs {
    /// Id of the folder to start crawling from.
    #[arg(short = 'r', long = "root-id", value_name = "FOLDER_ID")]
    pub root_id: String,

    /// YAML or JSON file listing `{folder_id, domain}` policy rules.
    #[arg(short = 'p', long = "policy", value_name = "PATH")]
    pub policy: PathBuf,

    /// Item types to report on: file, folder, or both.
    #[arg(short = 'i', long = "item-type", default_value = "both")]
    pub item_type: ItemScope,

    /// Remove permissions that violate policy.
    #[arg(short = 'f', long = "fix")]
    pub fix: bool,

    /// Seconds to pause between children of the same folder.
    #[arg(short = 'w', long = "wait", default_value_t = 0.0, value_name = "SECONDS")]
    pub wait: f64,

    /// Report title.
    #[arg(short = 's', long = "subject")]
    pub subject: Option<String>,

    /// Maximum folders listed at the same time (unbounded when omitted).
    #[arg(long = "max-concurrency", value_name = "N")]
    pub max_concurrency: Option<usize>,

    /// Attempts per API call, including the first.
    #[arg(long = "retry-attempts", default_value_t = 2, value_name = "N")]
    pub retry_attempts: u32,

    /// Write the JSON report here instead of stdout.
    #[arg(long = "report", value_name = "PATH")]
    pub report: Option<PathBuf>,
}

impl AuditArgs {
    /// Translate flags into a run configuration.
    pub fn run_config(&self) -> Result<RunConfig> {
        let child_delay = Duration::try_from_secs_f64(self.wait)
            .with_context(|| format!("--wait must be a non-negative number, got {}", self.wait))?;

        let mut config = RunConfig::new(self.root_id.trim());
        config.scope = self.item_type;
        config.remediate = self.fix;
        config.child_delay = child_delay;
        config.max_concurrent_listings = self.max_concurrency;
        config.retry = RetryPolicy::fixed(self.retry_attempts, Duration::from_secs(1));
        Ok(config)
    }

    /// Settings echoed into the report beyond the run configuration.
    pub fn report_settings(&self) -> Vec<Setting> {
        vec![
            Setting::new("policy", self.policy.display()),
            Setting::new(
                "report",
                self.report
                    .as_ref()
                    .map_or_else(|| "stdout".to_string(), |p| p.display().to_string()),
            ),
        ]
    }

    fn title(&self) -> String {
        match &self.subject {
            Some(subject) if !subject.trim().is_empty() => subject.trim().to_string(),
            _ => "Drive Policy Report".to_string(),
        }
    }
}

/// Run against the live Drive API configured from the environment.
pub async fn run_audit(args: &AuditArgs) -> Result<u8> {
    let api_config = DriveApiConfig::from_env().context("failed to configure Drive API access")?;
    tracing::debug!(?api_config, "drive api configuration");
    let client = Arc::new(DriveClient::new(api_config).context("failed to build Drive client")?);
    run_audit_with(args, client.clone(), client).await
}

/// Run with explicit collaborators.
pub async fn run_audit_with(
    args: &AuditArgs,
    lister: Arc<dyn ItemLister>,
    mutator: Arc<dyn PermissionMutator>,
) -> Result<u8> {
    let config = args.run_config()?;
    let policy: PolicyStore = match load_policy(&args.policy) {
        Ok(policy) => policy,
        Err(e) => {
            tracing::error!("{e}");
            return Ok(2);
        }
    };

    let run = PolicyRun::new(config, policy, lister, mutator)
        .with_title(args.title())
        .with_settings(args.report_settings());

    let outcome = match run.execute().await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("{e}");
            return Ok(2);
        }
    };

    publish(&outcome.report, args.report.as_ref())?;
    print_summary(&outcome.report);

    Ok(if outcome.report.has_violations() { 1 } else { 0 })
}

fn publish(report: &RunReport, path: Option<&PathBuf>) -> Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create report file {}", path.display()))?;
            JsonReportSink::new(BufWriter::new(file))
                .publish(report)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
        }
        None => {
            JsonReportSink::new(io::stdout().lock())
                .publish(report)
                .context("failed to write report to stdout")?;
        }
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    eprintln!(
        "{}: {} item(s) crawled, {} violation(s) on {} item(s), {} API call(s)",
        report.title,
        report.items_crawled,
        report.violation_count,
        report.notifications.len(),
        report.api_call_count
    );
    if let Some(fix) = &report.remediation {
        eprintln!(
            "  remediation: {} removed, {} failed",
            fix.succeeded, fix.failed
        );
    }
    if report.branch_failures > 0 {
        eprintln!(
            "  WARN: {} folder(s) could not be listed; results are incomplete",
            report.branch_failures
        );
    }
}
