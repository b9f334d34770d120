//! # End-to-End Runs
//!
//! Full runs over an in-memory drive, from root check to published report:
//! - The acme.com scenario with remediation disabled and enabled
//! - Bounded listing concurrency on a wide hierarchy
//! - JSON report contents

use std::sync::Arc;
use std::time::Duration;

use dpol_core::{ApiError, PolicyRule, PolicyStore, RunConfig};
use dpol_crawler::fake::{file, folder, user, FakeDrive};
use dpol_crawler::{FixOutcome, JsonReportSink, PolicyRun, ReportSink, RunPhase, Setting};

fn acme() -> Arc<FakeDrive> {
    let drive = Arc::new(FakeDrive::new());
    drive.insert(folder("root", "Company"), None);
    drive.insert(
        file("F1", "Handbook", vec![user("p-bob-acme", "bob@acme.com", "reader")]),
        Some("root"),
    );
    drive.insert(
        file("F2", "Forecast", vec![user("p-bob-other", "bob@other.com", "reader")]),
        Some("root"),
    );
    drive
}

fn acme_run(drive: &Arc<FakeDrive>, remediate: bool) -> PolicyRun {
    let mut config = RunConfig::new("root");
    config.remediate = remediate;
    PolicyRun::new(
        config,
        PolicyStore::new(vec![PolicyRule::new("root", "acme.com")]).unwrap(),
        drive.clone(),
        drive.clone(),
    )
}

// ---------------------------------------------------------------------------
// 1. acme.com scenario
// ---------------------------------------------------------------------------

#[tokio::test]
async fn acme_without_remediation_reports_one_violation() {
    let drive = acme();
    let outcome = acme_run(&drive, false).execute().await.unwrap();

    assert_eq!(outcome.violations.len(), 1);
    let v = &outcome.violations[0];
    assert_eq!(v.item_id.as_str(), "F2");
    assert_eq!(v.resolved_domain, "other.com");
    assert_eq!(v.fix, None);
    assert!(drive.deleted().is_empty());
    assert!(outcome.report.has_violations());
}

#[tokio::test]
async fn acme_with_remediation_deletes_the_grant() {
    let drive = acme();
    let outcome = acme_run(&drive, true).execute().await.unwrap();

    assert_eq!(outcome.violations.len(), 1);
    assert_eq!(outcome.violations[0].fix, Some(FixOutcome::Success));
    assert_eq!(drive.deleted().len(), 1);
    assert_eq!(drive.deleted()[0].1.as_str(), "p-bob-other");
    assert_eq!(
        outcome.phases.last().copied(),
        Some(RunPhase::Reporting)
    );
}

#[tokio::test]
async fn acme_with_failing_remediation_records_failure() {
    let drive = acme();
    drive.fail_delete(
        "p-bob-other",
        ApiError::from_status("permissions.delete", 404, "Permission not found"),
    );
    let outcome = acme_run(&drive, true).execute().await.unwrap();

    assert_eq!(outcome.violations[0].fix, Some(FixOutcome::Failure));
    assert!(drive.deleted().is_empty());
}

// ---------------------------------------------------------------------------
// 2. Bounded fan-out
// ---------------------------------------------------------------------------

fn wide(latency: Duration) -> Arc<FakeDrive> {
    let drive = Arc::new(FakeDrive::new().with_latency(latency));
    drive.insert(folder("root", "Root"), None);
    for i in 0..12 {
        let id = format!("team{i}");
        drive.insert(folder(&id, &id), Some("root"));
        drive.insert(
            file(&format!("{id}.doc"), "Doc", vec![user("p", "x@acme.com", "reader")]),
            Some(&id),
        );
    }
    drive
}

#[tokio::test(start_paused = true)]
async fn listing_concurrency_respects_bound() {
    let drive = wide(Duration::from_millis(20));
    let mut config = RunConfig::new("root");
    config.max_concurrent_listings = Some(3);

    let outcome = PolicyRun::new(
        config,
        PolicyStore::new(vec![PolicyRule::new("root", "acme.com")]).unwrap(),
        drive.clone(),
        drive.clone(),
    )
    .execute()
    .await
    .unwrap();

    assert_eq!(outcome.report.items_crawled, 24);
    assert!(drive.peak_concurrent_listings() <= 3);
    assert!(drive.peak_concurrent_listings() >= 2);
}

#[tokio::test(start_paused = true)]
async fn unbounded_crawl_lists_siblings_concurrently() {
    let drive = wide(Duration::from_millis(20));
    let outcome = acme_run(&drive, false).execute().await.unwrap();

    assert_eq!(outcome.report.items_crawled, 24);
    assert_eq!(drive.peak_concurrent_listings(), 12);
}

// ---------------------------------------------------------------------------
// 3. Published report
// ---------------------------------------------------------------------------

#[tokio::test]
async fn json_report_carries_run_details() {
    let drive = acme();
    let outcome = acme_run(&drive, true)
        .with_title("Drive Policy Report - Company")
        .with_settings(vec![Setting::new("subject", "Weekly sharing audit")])
        .execute()
        .await
        .unwrap();

    let mut sink = JsonReportSink::new(Vec::new());
    sink.publish(&outcome.report).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&sink.into_inner()).unwrap();

    assert_eq!(json["title"], "Drive Policy Report - Company");
    assert_eq!(json["folder_policies"][0]["folder_id"], "root");
    assert_eq!(json["folder_policies"][0]["name"], "Company");
    assert_eq!(json["items_crawled"], 2);
    assert_eq!(json["violation_count"], 1);
    assert_eq!(json["remediation"]["succeeded"], 1);

    let notice = &json["notifications"][0];
    assert_eq!(notice["item_id"], "F2");
    assert_eq!(notice["item_type"], "File");
    assert_eq!(notice["url"], "https://drive.example/file/F2");
    assert_eq!(notice["permissions"][0]["grantee"], "bob@other.com");
    assert_eq!(notice["permissions"][0]["response"], "Success");

    let settings = json["settings"].as_array().unwrap();
    assert!(settings
        .iter()
        .any(|s| s["name"] == "subject" && s["value"] == "Weekly sharing audit"));
    assert!(settings.iter().any(|s| s["name"] == "fix" && s["value"] == "true"));
}
