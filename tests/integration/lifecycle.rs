// tests/integration/lifecycle.rs - Session lifecycle and multi-backend scheduling

use seedcheck::harness::RunState;
use seedcheck::{
    BackendKind, Config, ConnectionState, Connector, HarnessSummary, Orchestrator, RunMode, RunPlan,
    RunStatus, ShutdownCoordinator, ShutdownReason,
};

use tokio_test::{assert_err, assert_ok};

use super::{print_test_header, print_test_success};
use crate::helpers::backends::{simulated_backend, simulated_backends};
use crate::helpers::connectors::{CallCounts, CountingConnector};
use crate::helpers::test_data::standard_dataset;

#[tokio::test]
async fn test_disconnect_happens_exactly_once_per_run() {
    print_test_header("disconnect exactly once", "🔒");

    for mode in [RunMode::SeedAndVerify, RunMode::VerifyOnly] {
        for backend in simulated_backends() {
            let (mut connector, counts) = CountingConnector::wrap(backend.connector());
            let report = Orchestrator::new(standard_dataset())
                .run(&mut connector, mode)
                .await;

            assert_eq!(CallCounts::get(&counts.connect), 1);
            assert_eq!(CallCounts::get(&counts.disconnect), 1);
            assert_eq!(backend.faults().close_count(), 1, "backend {}", backend.name());
            assert_eq!(report.final_state, RunState::Closed);
            assert_eq!(connector.state(), ConnectionState::Disconnected);
        }
    }

    print_test_success("disconnect exactly once");
}

#[tokio::test]
async fn test_connector_is_reusable_after_disconnect() {
    let backend = simulated_backend(BackendKind::Gremlin);
    let mut connector = backend.connector();

    assert_ok!(connector.connect().await);
    assert_ok!(connector.connect().await);
    assert_eq!(backend.faults().open_count(), 1, "connect is idempotent");

    connector.disconnect().await;
    connector.disconnect().await;
    assert_eq!(backend.faults().close_count(), 1, "disconnect is idempotent");

    connector.connect().await.unwrap();
    assert_eq!(connector.state(), ConnectionState::Connected);
    connector.disconnect().await;
}

#[tokio::test]
async fn test_operations_require_a_connected_session() {
    let backend = simulated_backend(BackendKind::Cassandra);
    let mut connector = backend.connector();

    assert_err!(connector.ensure_namespace().await);
    assert_err!(connector.seed(standard_dataset().records()).await);
    assert_eq!(backend.faults().open_count(), 0);
}

#[tokio::test]
async fn test_run_all_reports_every_preset_in_order() {
    print_test_header("all presets, simulated", "🧪");

    let mut config = Config::sample();
    config.force_simulated();
    let expected: Vec<String> = config.backends.iter().map(|b| b.name.clone()).collect();

    for concurrency in [1, 4] {
        let plans = Orchestrator::plan(&config);
        let reports = Orchestrator::new(standard_dataset())
            .run_all(plans, concurrency)
            .await;
        let names: Vec<String> = reports.iter().map(|r| r.backend_name.clone()).collect();
        assert_eq!(names, expected);

        // the verify-only preset reads a store nobody seeded
        let summary = HarnessSummary::new(reports);
        let unclean: Vec<&str> = summary
            .reports
            .iter()
            .filter(|r| !r.is_clean())
            .map(|r| r.backend_name.as_str())
            .collect();
        assert_eq!(unclean, vec!["adf-blob-to-mongo"]);
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(
            summary.final_message(),
            "FAILED: 1 of 10 backends did not verify cleanly"
        );
    }

    print_test_success("all presets, simulated");
}

#[tokio::test]
async fn test_disabled_backends_are_not_planned() {
    let mut config = Config::sample();
    config.force_simulated();
    config.backends.retain(|b| b.mode == RunMode::SeedAndVerify);
    config.backends[0].enabled = false;

    let plans = Orchestrator::plan(&config);
    assert_eq!(plans.len(), config.backends.len() - 1);

    let summary = HarnessSummary::new(Orchestrator::new(standard_dataset()).run_all(plans, 2).await);
    assert!(summary.all_clean(), "{}", summary.render());
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(summary.final_message(), "OK: 8 backends verified");
}

#[tokio::test]
async fn test_shutdown_cancels_pending_runs() {
    let coordinator = ShutdownCoordinator::new();
    coordinator.initiate_shutdown(ShutdownReason::Requested);

    let backends = simulated_backends();
    let plans: Vec<RunPlan> = backends
        .iter()
        .map(|b| RunPlan::new(b.connector(), RunMode::SeedAndVerify))
        .collect();
    let reports = Orchestrator::new(standard_dataset())
        .with_shutdown(coordinator.signal())
        .run_all(plans, 2)
        .await;

    assert!(reports.iter().all(|r| r.status == RunStatus::Cancelled));
    for backend in &backends {
        assert_eq!(backend.faults().open_count(), 0);
    }
    assert_eq!(HarnessSummary::new(reports).exit_code(), 1);
}

#[tokio::test]
async fn test_shutdown_during_seed_still_disconnects() {
    print_test_header("cancel mid-run", "🛑");

    let backend = simulated_backend(BackendKind::Table);
    let coordinator = ShutdownCoordinator::new();
    let (connector, counts) = CountingConnector::wrap(backend.connector());
    let mut connector = connector.shutdown_after_seed(coordinator.clone());

    let report = Orchestrator::new(standard_dataset())
        .with_shutdown(coordinator.signal())
        .run(&mut connector, RunMode::SeedAndVerify)
        .await;

    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.final_state, RunState::Closed);
    assert_eq!(CallCounts::get(&counts.seed), 1);
    assert_eq!(CallCounts::get(&counts.read_all), 0);
    assert_eq!(CallCounts::get(&counts.disconnect), 1);
    assert_eq!(backend.faults().open_count(), 1);
    assert_eq!(backend.faults().close_count(), 1);
    assert_eq!(HarnessSummary::new(vec![report]).exit_code(), 1);

    print_test_success("cancel mid-run");
}
