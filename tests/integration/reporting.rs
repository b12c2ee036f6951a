// tests/integration/reporting.rs - Metrics, digests and rendered summaries from real runs

use pretty_assertions::assert_eq;
use seedcheck::report::RunDigest;
use seedcheck::{BackendKind, HarnessMetrics, HarnessSummary, Orchestrator, RunMode, RunPlan};

use crate::helpers::backends::simulated_backend;
use crate::helpers::test_data::standard_dataset;

#[tokio::test]
async fn test_metrics_follow_the_runs() {
    let metrics = HarnessMetrics::new().unwrap();
    let orchestrator = Orchestrator::new(standard_dataset()).with_metrics(metrics.clone());

    let healthy = simulated_backend(BackendKind::Queue);
    let flaky = simulated_backend(BackendKind::KeyValue);
    flaky.faults().fail_writes_for("marekp");
    let down = simulated_backend(BackendKind::Gremlin);
    down.faults().set_unreachable(true);

    let plans = vec![
        RunPlan::new(healthy.connector(), RunMode::SeedAndVerify),
        RunPlan::new(flaky.connector(), RunMode::SeedAndVerify),
        RunPlan::new(down.connector(), RunMode::SeedAndVerify),
    ];
    orchestrator.run_all(plans, 3).await;

    let text = metrics.gather_text().unwrap();
    for line in [
        "seedcheck_runs_total{backend=\"queue-storage\",status=\"completed\"} 1",
        "seedcheck_runs_total{backend=\"cache-for-redis\",status=\"completed\"} 1",
        "seedcheck_runs_total{backend=\"cosmos-gremlin\",status=\"failed\"} 1",
        "seedcheck_records_seeded_total{backend=\"cache-for-redis\",result=\"error\"} 1",
        "seedcheck_records_seeded_total{backend=\"cache-for-redis\",result=\"ok\"} 4",
        "seedcheck_records_verified_total{backend=\"queue-storage\",result=\"pass\"} 5",
        "seedcheck_step_duration_seconds_count{step=\"connect\"} 3",
        "seedcheck_step_duration_seconds_count{step=\"seed\"} 2",
    ] {
        assert!(text.contains(line), "missing `{}` in:\n{}", line, text);
    }
}

#[tokio::test]
async fn test_summary_render_lists_every_backend() {
    let clean = simulated_backend(BackendKind::Table);
    let broken = simulated_backend(BackendKind::DataLake);
    broken.faults().fail_writes_for("gregsp");

    let plans = vec![
        RunPlan::new(clean.connector(), RunMode::SeedAndVerify),
        RunPlan::new(broken.connector(), RunMode::SeedAndVerify),
    ];
    let summary = HarnessSummary::new(Orchestrator::new(standard_dataset()).run_all(plans, 2).await);
    let rendered = summary.render();
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(
        lines[0],
        "[table-storage] completed attempted=5 succeeded=5 failed=0"
    );
    assert_eq!(
        lines[1],
        "[data-lake] completed attempted=5 succeeded=4 failed=1"
    );
    assert!(lines[2].starts_with("    gregsp: write failed: "), "{}", lines[2]);
    assert!(lines[2].ends_with("; not found"), "{}", lines[2]);
    assert_eq!(
        lines.last().copied(),
        Some("FAILED: 1 of 2 backends did not verify cleanly")
    );
}

#[tokio::test]
async fn test_json_digest_of_a_run() {
    let backend = simulated_backend(BackendKind::Blob);
    backend.faults().fail_writes_for("kjerochi");
    let mut connector = backend.connector();
    let report = Orchestrator::new(standard_dataset())
        .run(connector.as_mut(), RunMode::SeedAndVerify)
        .await;

    let digest = serde_json::to_value(RunDigest::from(&report)).unwrap();
    assert_eq!(digest["backend"], "blob-storage");
    assert_eq!(digest["kind"], "blob");
    assert_eq!(digest["mode"], "seed_and_verify");
    assert_eq!(digest["status"], "completed");
    assert_eq!(digest["final_state"], "closed");
    assert_eq!(digest["attempted"], 5);
    assert_eq!(digest["succeeded"], 4);
    assert_eq!(digest["failed_records"], serde_json::json!(["kjerochi"]));
    assert_eq!(digest["partial"], false);
    assert!(uuid::Uuid::parse_str(digest["run_id"].as_str().unwrap()).is_ok());
}
