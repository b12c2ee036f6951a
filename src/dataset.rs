// src/dataset.rs - Fixed sample dataset shared by every backend run

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{HarnessError, Result};
use crate::record::SampleRecord;

/// Immutable batch of sample records. Built once per process and shared
/// read-only (behind an `Arc`) by every concurrent backend run.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleDataset {
    records: Vec<SampleRecord>,
}

impl SampleDataset {
    /// The five people seeded into every backend
    pub fn standard() -> Self {
        Self {
            records: vec![
                SampleRecord::new("kjerochi", 52491, "Prague"),
                SampleRecord::new("marekp", 32462, "Prague"),
                SampleRecord::new("mbogdanova", 29506, "Prague"),
                SampleRecord::new("anstaske", 72834, "Tallinn"),
                SampleRecord::new("gregsp", 1732, "Redmond"),
            ],
        }
    }

    /// Build a dataset from arbitrary records, rejecting duplicate ids
    pub fn from_records(records: Vec<SampleRecord>) -> Result<Self> {
        let mut seen = HashSet::new();
        for record in &records {
            if record.external_id().is_empty() {
                return Err(HarnessError::Config(
                    "sample record with empty externalId".to_string(),
                ));
            }
            if !seen.insert(record.external_id()) {
                return Err(HarnessError::Config(format!(
                    "duplicate externalId in sample dataset: {}",
                    record.external_id()
                )));
            }
        }
        Ok(Self { records })
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, external_id: &str) -> Option<&SampleRecord> {
        self.records.iter().find(|r| r.external_id() == external_id)
    }
}

impl Default for SampleDataset {
    fn default() -> Self {
        Self::standard()
    }
}
