// tests/helpers/assertions.rs - Custom test assertions

use std::collections::HashMap;

use futures::TryStreamExt;
use seedcheck::record::{FIELD_CITY, FIELD_NUMERIC_ID};
use seedcheck::{BackendRecord, Connector, FieldValue, RunReport, RunStatus, SampleDataset};

/// Assert the attempted/succeeded/failed triple of a report
pub fn assert_counts(report: &RunReport, expected: (usize, usize, usize)) {
    assert_eq!(
        (report.attempted, report.succeeded, report.failed),
        expected,
        "backend {} counts (attempted, succeeded, failed) differ:\n{}",
        report.backend_name,
        report.render()
    );
}

/// Assert a run completed with every record verified
pub fn assert_clean_run(report: &RunReport, dataset: &SampleDataset) {
    assert_eq!(
        report.status,
        RunStatus::Completed,
        "backend {} did not complete:\n{}",
        report.backend_name,
        report.render()
    );
    assert_counts(report, (dataset.len(), dataset.len(), 0));
    assert!(report.is_clean(), "backend {} is not clean", report.backend_name);
}

/// Drain a connector's read-back into records keyed by external id
pub async fn read_back(connector: &dyn Connector) -> HashMap<String, BackendRecord> {
    let records: Vec<BackendRecord> = connector
        .read_all()
        .try_collect()
        .await
        .expect("read-back succeeds");
    let mut materialized = HashMap::new();
    for record in records {
        seedcheck::harness::merge_latest(&mut materialized, record);
    }
    materialized
}

/// Assert a read-back record carries the given canonical values
pub fn assert_record(record: &BackendRecord, numeric_id: i64, city: &str) {
    let numeric = record
        .field(FIELD_NUMERIC_ID)
        .unwrap_or_else(|| panic!("{} has no numericId", record.external_id));
    assert!(
        numeric.matches(&FieldValue::Integer(numeric_id)),
        "{} numericId: expected {}, got {}",
        record.external_id,
        numeric_id,
        numeric
    );
    assert_eq!(
        record.field(FIELD_CITY),
        Some(&FieldValue::Text(city.to_string())),
        "{} city",
        record.external_id
    );
}
