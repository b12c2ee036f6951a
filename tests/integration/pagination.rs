// tests/integration/pagination.rs - Paged enumeration across every backend family

use futures::TryStreamExt;
use std::collections::HashSet;

use seedcheck::{BackendKind, BackendRecord, RunMode, SampleDataset};

use super::{print_test_header, print_test_success, run_backend};
use crate::helpers::assertions::assert_clean_run;
use crate::helpers::backends::{simulated_backend, simulated_backends};
use crate::helpers::test_data::{small_page_options, SAMPLE_IDS};

#[tokio::test]
async fn test_five_records_in_pages_of_two() {
    print_test_header("paged read-back", "📚");

    for backend in simulated_backends() {
        let seeded = run_backend(&backend, RunMode::SeedAndVerify).await;
        assert!(seeded.is_clean(), "{}", seeded.render());

        backend.faults().cap_page_size(2);
        let mut connector = backend.connector_with(small_page_options(2));
        connector.connect().await.unwrap();
        let records: Vec<BackendRecord> = connector.read_all().try_collect().await.unwrap();
        connector.disconnect().await;

        let ids: HashSet<&str> = records.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(records.len(), SAMPLE_IDS.len(), "backend {}", backend.name());
        assert_eq!(ids, SAMPLE_IDS.iter().copied().collect::<HashSet<_>>());

        // pages of 2, 2 and 1; a queue needs one more empty receive to know it is done
        let expected_pages = if backend.kind() == BackendKind::Queue { 4 } else { 3 };
        assert_eq!(
            backend.faults().pages_served(),
            expected_pages,
            "backend {}",
            backend.name()
        );
    }

    print_test_success("paged read-back");
}

#[tokio::test]
async fn test_read_all_is_restartable() {
    for backend in simulated_backends() {
        run_backend(&backend, RunMode::SeedAndVerify).await;

        let mut connector = backend.connector_with(small_page_options(2));
        connector.connect().await.unwrap();
        let first: Vec<BackendRecord> = connector.read_all().try_collect().await.unwrap();
        let second: Vec<BackendRecord> = connector.read_all().try_collect().await.unwrap();
        connector.disconnect().await;

        assert_eq!(first.len(), SAMPLE_IDS.len(), "backend {}", backend.name());
        assert_eq!(second.len(), first.len(), "backend {}", backend.name());
    }
}

#[tokio::test]
async fn test_shuffled_pages_still_verify() {
    let dataset = SampleDataset::standard();
    for kind in [BackendKind::Table, BackendKind::CosmosSql, BackendKind::Blob] {
        let backend = simulated_backend(kind);
        backend.faults().shuffle(true);
        backend.faults().cap_page_size(2);

        let report = run_backend(&backend, RunMode::SeedAndVerify).await;
        assert_clean_run(&report, &dataset);
    }
}

#[tokio::test]
async fn test_page_size_setting_overrides_harness_default() {
    let mut backend = simulated_backend(BackendKind::Mongo);
    backend.config = backend.config.clone().with_setting("page_size", "1");
    run_backend(&backend, RunMode::SeedAndVerify).await;

    let mut connector = backend.connector();
    connector.connect().await.unwrap();
    let records: Vec<BackendRecord> = connector.read_all().try_collect().await.unwrap();
    connector.disconnect().await;

    assert_eq!(records.len(), SAMPLE_IDS.len());
    assert_eq!(backend.faults().pages_served(), SAMPLE_IDS.len());
}
