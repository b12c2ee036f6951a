// tests/integration/mod.rs - Integration tests driving the harness against simulated and mock backends

use seedcheck::{Orchestrator, RunMode, RunReport, SampleDataset};
use std::sync::Arc;

use crate::helpers::backends::SimulatedBackend;
use crate::helpers::test_data::standard_dataset;

// Test modules
pub mod config_loading;
pub mod failures;
pub mod lifecycle;
pub mod pagination;
pub mod reporting;
pub mod table_rest;

/// Run one backend through the orchestrator on a fresh connector
pub async fn run_backend(backend: &SimulatedBackend, mode: RunMode) -> RunReport {
    run_backend_with(backend, mode, standard_dataset()).await
}

pub async fn run_backend_with(
    backend: &SimulatedBackend,
    mode: RunMode,
    dataset: Arc<SampleDataset>,
) -> RunReport {
    let mut connector = backend.connector();
    Orchestrator::new(dataset).run(connector.as_mut(), mode).await
}

/// Common test setup message
pub fn print_test_header(test_name: &str, emoji: &str) {
    println!("{} Testing {}...", emoji, test_name);
}

/// Common test success message
pub fn print_test_success(test_name: &str) {
    println!("✅ {} passed", test_name);
}
