// tests/integration/table_rest.rs - Live table transport against a mock REST endpoint

use seedcheck::{
    create_connector, BackendConfig, ConnectorOptions, ErrorCategory, Orchestrator, RunMode,
    RunReport, RunStatus, SampleDataset,
};

use super::{print_test_header, print_test_success};
use crate::helpers::assertions::{assert_clean_run, assert_counts};
use crate::helpers::mock_table_server::MockTableServer;
use crate::helpers::test_data::{small_page_options, standard_dataset, table_config};

const TABLE: &str = "seedcheckpeople";

async fn run_live(config: &BackendConfig, options: &ConnectorOptions, mode: RunMode) -> RunReport {
    let mut connector = create_connector(config, options).expect("live table transport is built in");
    Orchestrator::new(standard_dataset())
        .run(connector.as_mut(), mode)
        .await
}

#[tokio::test]
async fn test_table_round_trip_over_rest() {
    print_test_header("table REST round trip", "🌐");

    let server = MockTableServer::new();
    let addr = server.start().await;
    let config = table_config("table-storage", &MockTableServer::connection_string(addr), TABLE);

    let report = run_live(&config, &ConnectorOptions::default(), RunMode::SeedAndVerify).await;
    assert_clean_run(&report, &SampleDataset::standard());
    assert_eq!(report.namespace.as_deref(), Some(TABLE));
    assert_eq!(server.entity_count(TABLE).await, 5);

    let requests = server.requests().await;
    assert!(requests
        .iter()
        .all(|r| r.api_version.as_deref() == Some("2019-02-02")));
    assert!(requests
        .iter()
        .any(|r| r.method == "POST" && r.resource == "Tables"));
    assert_eq!(requests.iter().filter(|r| r.method == "PUT").count(), 5);

    print_test_success("table REST round trip");
}

#[tokio::test]
async fn test_existing_table_and_reseed_are_accepted() {
    let server = MockTableServer::new();
    let addr = server.start().await;
    let config = table_config("table-storage", &MockTableServer::connection_string(addr), TABLE);

    for _ in 0..2 {
        let report = run_live(&config, &ConnectorOptions::default(), RunMode::SeedAndVerify).await;
        assert!(report.is_clean(), "{}", report.render());
    }
    assert_eq!(server.entity_count(TABLE).await, 5);
}

#[tokio::test]
async fn test_continuation_headers_are_followed() {
    let server = MockTableServer::new();
    server.set_page_cap(2).await;
    let addr = server.start().await;
    let config = table_config("table-storage", &MockTableServer::connection_string(addr), TABLE);

    let report = run_live(&config, &small_page_options(2), RunMode::SeedAndVerify).await;
    assert_clean_run(&report, &SampleDataset::standard());

    let queries = server
        .requests()
        .await
        .into_iter()
        .filter(|r| r.method == "GET" && r.resource.ends_with("()"))
        .count();
    assert_eq!(queries, 3);
}

#[tokio::test]
async fn test_forged_signature_is_an_auth_failure() {
    let server = MockTableServer::new();
    let addr = server.start().await;
    let config = table_config(
        "table-storage",
        &MockTableServer::connection_string_with_bad_signature(addr),
        TABLE,
    );

    let report = run_live(&config, &ConnectorOptions::default(), RunMode::SeedAndVerify).await;
    match &report.status {
        RunStatus::Failed {
            category: ErrorCategory::Connect,
            message,
        } => assert!(message.contains("auth rejected"), "{}", message),
        other => panic!("unexpected status {:?}", other),
    }
    assert_counts(&report, (0, 0, 0));
    assert_eq!(server.entity_count(TABLE).await, 0);
}

#[tokio::test]
async fn test_account_key_connection_string_is_invalid_config() {
    let config = table_config(
        "table-storage",
        "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=abc==;TableEndpoint=https://acct.table.core.windows.net",
        TABLE,
    );

    let report = run_live(&config, &ConnectorOptions::default(), RunMode::SeedAndVerify).await;
    match &report.status {
        RunStatus::Failed {
            category: ErrorCategory::Connect,
            message,
        } => assert!(message.contains("invalid config"), "{}", message),
        other => panic!("unexpected status {:?}", other),
    }
}

#[tokio::test]
async fn test_entity_removed_behind_the_harness_is_not_found() {
    let server = MockTableServer::new();
    let addr = server.start().await;
    let config = table_config("table-storage", &MockTableServer::connection_string(addr), TABLE);

    run_live(&config, &ConnectorOptions::default(), RunMode::SeedAndVerify).await;
    assert!(server.remove_entity(TABLE, "seed", "anstaske").await);

    let report = run_live(&config, &ConnectorOptions::default(), RunMode::VerifyOnly).await;
    assert_counts(&report, (5, 4, 1));
    assert!(report.render().contains("anstaske: not found"));
}

#[tokio::test]
async fn test_live_table_from_environment() {
    // Point SEEDCHECK_LIVE_TABLE_CONNECTION at a real account to exercise the service itself
    if crate::helpers::skip_if_no_env("SEEDCHECK_LIVE_TABLE_CONNECTION") {
        return;
    }
    let connection = std::env::var("SEEDCHECK_LIVE_TABLE_CONNECTION").unwrap();
    let config = table_config("table-live", &connection, TABLE);

    let report = run_live(&config, &ConnectorOptions::default(), RunMode::SeedAndVerify).await;
    assert!(report.is_clean(), "{}", report.render());
}
