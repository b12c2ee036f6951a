// tests/integration/failures.rs - Connect, schema, write and read failures surface in reports

use seedcheck::harness::RunState;
use seedcheck::{
    BackendConfig, BackendKind, ErrorCategory, HarnessSummary, Orchestrator, RunMode, RunStatus,
    SampleDataset,
};

use super::{print_test_header, print_test_success, run_backend, run_backend_with};
use crate::helpers::assertions::{assert_counts, read_back};
use crate::helpers::backends::{simulated_backend, simulated_backends, SimulatedBackend};
use crate::helpers::connectors::{CallCounts, CountingConnector};
use crate::helpers::test_data::{dataset_with_city, small_page_options, standard_dataset};

fn failed_with(status: &RunStatus, expected: ErrorCategory) -> String {
    match status {
        RunStatus::Failed { category, message } if *category == expected => message.clone(),
        other => panic!("expected failure category {:?}, got {:?}", expected, other),
    }
}

#[tokio::test]
async fn test_unreachable_endpoint_never_seeds() {
    print_test_header("connect failure", "🔌");

    for backend in simulated_backends() {
        backend.faults().set_unreachable(true);
        let (mut connector, counts) = CountingConnector::wrap(backend.connector());

        let report = Orchestrator::new(standard_dataset())
            .run(&mut connector, RunMode::SeedAndVerify)
            .await;

        let message = failed_with(&report.status, ErrorCategory::Connect);
        assert!(message.contains("unreachable"), "{}", message);
        assert_counts(&report, (0, 0, 0));
        assert_eq!(CallCounts::get(&counts.seed), 0);
        assert_eq!(CallCounts::get(&counts.ensure_namespace), 0);
        assert_eq!(CallCounts::get(&counts.read_all), 0);
        assert_eq!(CallCounts::get(&counts.disconnect), 1);
        assert_eq!(report.final_state, RunState::Closed);
    }

    print_test_success("connect failure");
}

#[tokio::test]
async fn test_rejected_credentials_are_reported_as_auth_failure() {
    let backend = simulated_backend(BackendKind::CosmosSql);
    backend.faults().reject_credentials(true);

    let report = run_backend(&backend, RunMode::SeedAndVerify).await;
    let message = failed_with(&report.status, ErrorCategory::Connect);
    assert!(message.contains("auth rejected"), "{}", message);

    let summary = HarnessSummary::new(vec![report]);
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(
        summary.final_message(),
        "FAILED: backend 'cosmos-core-sql' aborted (failed(connect))"
    );
}

#[tokio::test]
async fn test_missing_setting_fails_before_opening_a_session() {
    let mut config = simulated_backend(BackendKind::Queue).config;
    config.settings.remove("queue_name");
    let backend = SimulatedBackend::new(config);

    let report = run_backend(&backend, RunMode::SeedAndVerify).await;
    let message = failed_with(&report.status, ErrorCategory::Connect);
    assert!(message.contains("queue_name"), "{}", message);
    assert_eq!(backend.faults().open_count(), 0);
}

#[tokio::test]
async fn test_invalid_table_name_is_a_config_failure() {
    let config = BackendConfig::new("bad-table", BackendKind::Table)
        .with_setting("connection_string", "UseDevelopmentStorage=true")
        .with_setting("table_name", "9-people");
    let backend = SimulatedBackend::new(config);

    let report = run_backend(&backend, RunMode::SeedAndVerify).await;
    let message = failed_with(&report.status, ErrorCategory::Connect);
    assert!(message.contains("9-people"), "{}", message);
    assert_eq!(backend.faults().open_count(), 0);
}

#[tokio::test]
async fn test_namespace_refusal_stops_before_seeding() {
    // key prefixes need no creation step
    let backends = simulated_backends()
        .into_iter()
        .filter(|b| b.kind() != BackendKind::KeyValue);
    for backend in backends {
        backend.faults().reject_namespace(true);
        let (mut connector, counts) = CountingConnector::wrap(backend.connector());

        let report = Orchestrator::new(standard_dataset())
            .run(&mut connector, RunMode::SeedAndVerify)
            .await;

        failed_with(&report.status, ErrorCategory::Schema);
        assert!(report.status.is_fatal());
        assert_eq!(CallCounts::get(&counts.seed), 0);
        assert_eq!(CallCounts::get(&counts.read_all), 0);
        assert_eq!(CallCounts::get(&counts.disconnect), 1);
        assert_eq!(backend.faults().close_count(), 1, "backend {}", backend.name());
    }
}

#[tokio::test]
async fn test_single_write_failure_does_not_abort_the_batch() {
    print_test_header("per-record write failure", "✍️");

    for backend in simulated_backends() {
        backend.faults().fail_writes_for("anstaske");
        let report = run_backend(&backend, RunMode::SeedAndVerify).await;

        assert_eq!(report.status, RunStatus::Completed, "{}", report.render());
        assert_counts(&report, (5, 4, 1));
        assert_eq!(report.seed.succeeded(), 4);

        let failed: Vec<&str> = report.failed_outcomes().map(|o| o.record_id.as_str()).collect();
        assert_eq!(failed, vec!["anstaske"]);
        assert!(report.render().contains("anstaske: write failed"));
    }

    print_test_success("per-record write failure");
}

#[tokio::test]
async fn test_record_removed_after_seeding_is_not_found() {
    for backend in simulated_backends() {
        let seeded = run_backend(&backend, RunMode::SeedAndVerify).await;
        assert!(seeded.is_clean(), "{}", seeded.render());
        assert!(backend.remove_record("anstaske"), "backend {}", backend.name());

        let report = run_backend(&backend, RunMode::VerifyOnly).await;
        assert_counts(&report, (5, 4, 1));

        let missing = report
            .outcomes
            .iter()
            .find(|o| o.record_id == "anstaske")
            .expect("outcome for every sample record");
        assert!(!missing.found);
        assert!(report.render().contains("anstaske: not found"), "{}", report.render());
    }
}

#[tokio::test]
async fn test_changed_value_is_a_field_mismatch() {
    let backend = simulated_backend(BackendKind::Table);
    run_backend_with(
        &backend,
        RunMode::SeedAndVerify,
        dataset_with_city("gregsp", "Seattle"),
    )
    .await;

    let report = run_backend(&backend, RunMode::VerifyOnly).await;
    assert_counts(&report, (5, 4, 1));
    let rendered = report.render();
    assert!(
        rendered.contains("gregsp: mismatched city (expected \"Redmond\", got \"Seattle\")"),
        "{}",
        rendered
    );
}

#[tokio::test]
async fn test_failed_page_leaves_a_partial_report() {
    print_test_header("mid-enumeration read failure", "📄");

    for backend in simulated_backends() {
        let seeded = run_backend(&backend, RunMode::SeedAndVerify).await;
        assert!(seeded.is_clean(), "{}", seeded.render());

        backend.faults().cap_page_size(2);
        backend.faults().fail_page_at(1);
        let mut connector = backend.connector_with(small_page_options(2));
        let report = Orchestrator::new(standard_dataset())
            .run(connector.as_mut(), RunMode::VerifyOnly)
            .await;

        assert_eq!(report.status, RunStatus::Completed, "{}", report.render());
        assert!(report.partial, "backend {}", backend.name());
        assert!(report.read_error.is_some());
        assert!(!report.is_clean());
        // only the first page was read
        assert_counts(&report, (5, 2, 3));
        assert!(report.render().contains("read incomplete"));
    }

    print_test_success("mid-enumeration read failure");
}

#[tokio::test]
async fn test_zero_successful_writes_is_a_write_failure() {
    let backend = simulated_backend(BackendKind::Blob);
    for record in SampleDataset::standard().records() {
        backend.faults().fail_writes_for(record.external_id());
    }

    let report = run_backend(&backend, RunMode::SeedAndVerify).await;
    failed_with(&report.status, ErrorCategory::Write);
    assert!(!report.status.is_fatal());
    assert_counts(&report, (5, 0, 5));

    // nothing landed for a later read-back to find
    let mut connector = backend.connector();
    connector.connect().await.unwrap();
    assert!(read_back(connector.as_ref()).await.is_empty());
}
