// src/report.rs - Verification outcomes, run reports and text rendering

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::config::RunMode;
use crate::connector::SeedReport;
use crate::dataset::SampleDataset;
use crate::error::{ErrorCategory, HarnessError};
use crate::harness::RunState;
use crate::record::{BackendRecord, FieldValue};

#[derive(Debug, Clone, PartialEq)]
pub struct FieldMismatch {
    pub field: String,
    pub expected: FieldValue,
    /// `None` when the stored record lacks the field entirely
    pub actual: Option<FieldValue>,
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actual {
            Some(actual) => write!(f, "{} (expected {}, got {})", self.field, self.expected, actual),
            None => write!(f, "{} (expected {}, missing)", self.field, self.expected),
        }
    }
}

/// Verification result for one sample record
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOutcome {
    pub record_id: String,
    pub found: bool,
    pub matched_fields: BTreeSet<String>,
    pub mismatches: Vec<FieldMismatch>,
    pub write_error: Option<String>,
}

impl VerificationOutcome {
    pub fn passed(&self) -> bool {
        self.found && self.mismatches.is_empty() && self.write_error.is_none()
    }

    fn not_written(record_id: &str, write_error: Option<String>) -> Self {
        Self {
            record_id: record_id.to_string(),
            found: false,
            matched_fields: BTreeSet::new(),
            mismatches: Vec::new(),
            write_error,
        }
    }

    fn describe_failure(&self) -> String {
        let mut reasons = Vec::new();
        if let Some(error) = &self.write_error {
            reasons.push(format!("write failed: {}", error));
        }
        if !self.found {
            reasons.push("not found".to_string());
        }
        if !self.mismatches.is_empty() {
            let fields: Vec<String> = self.mismatches.iter().map(|m| m.to_string()).collect();
            reasons.push(format!("mismatched {}", fields.join(", ")));
        }
        format!("{}: {}", self.record_id, reasons.join("; "))
    }
}

/// Compare every sample record against the materialized read-back.
/// Pure: no I/O, no ordering assumptions.
pub fn verify(
    dataset: &SampleDataset,
    materialized: &HashMap<String, BackendRecord>,
) -> Vec<VerificationOutcome> {
    dataset
        .records()
        .iter()
        .map(|expected| {
            let Some(stored) = materialized.get(expected.external_id()) else {
                return VerificationOutcome::not_written(expected.external_id(), None);
            };

            let mut matched_fields = BTreeSet::new();
            let mut mismatches = Vec::new();
            for (field, value) in expected.expected_fields() {
                match stored.field(field) {
                    Some(actual) if actual.matches(&value) => {
                        matched_fields.insert(field.to_string());
                    }
                    actual => mismatches.push(FieldMismatch {
                        field: field.to_string(),
                        expected: value,
                        actual: actual.cloned(),
                    }),
                }
            }

            VerificationOutcome {
                record_id: expected.external_id().to_string(),
                found: true,
                matched_fields,
                mismatches,
                write_error: None,
            }
        })
        .collect()
}

/// Outcomes for a run that stopped after seeding: nothing was read back
pub fn unverified(dataset: &SampleDataset, seed: &SeedReport) -> Vec<VerificationOutcome> {
    dataset
        .records()
        .iter()
        .map(|record| {
            VerificationOutcome::not_written(
                record.external_id(),
                seed.error_for(record.external_id()).map(str::to_string),
            )
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Completed,
    Failed {
        category: ErrorCategory,
        message: String,
    },
    Cancelled,
}

impl RunStatus {
    pub fn from_error(error: &HarnessError) -> Self {
        match error {
            HarnessError::Cancelled => RunStatus::Cancelled,
            other => RunStatus::Failed {
                category: other.category(),
                message: other.to_string(),
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Failed { .. } => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    /// Config, connect and schema failures abort a backend before verification
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RunStatus::Failed {
                category: ErrorCategory::Config | ErrorCategory::Connect | ErrorCategory::Schema,
                ..
            }
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Failed { category, .. } => write!(f, "failed({})", category.as_str()),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Everything one backend run produced. Read-only once returned.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub backend_name: String,
    pub kind: String,
    pub mode: RunMode,
    pub run_id: String,
    pub namespace: Option<String>,
    pub status: RunStatus,
    pub final_state: RunState,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<VerificationOutcome>,
    /// Enumeration stopped early; outcomes reflect the records read before the error
    pub partial: bool,
    pub read_error: Option<String>,
    pub seed: SeedReport,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl RunReport {
    pub fn new(backend_name: impl Into<String>, kind: impl Into<String>, mode: RunMode) -> Self {
        Self {
            backend_name: backend_name.into(),
            kind: kind.into(),
            mode,
            run_id: Uuid::new_v4().to_string(),
            namespace: None,
            status: RunStatus::Completed,
            final_state: RunState::Init,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            outcomes: Vec::new(),
            partial: false,
            read_error: None,
            seed: SeedReport::default(),
            started_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    /// Report for a backend whose connector could not even be built
    pub fn aborted(
        backend_name: impl Into<String>,
        kind: impl Into<String>,
        mode: RunMode,
        error: &HarnessError,
    ) -> Self {
        let mut report = Self::new(backend_name, kind, mode);
        report.status = RunStatus::from_error(error);
        report.final_state = RunState::Closed;
        report
    }

    /// Replace outcomes and recompute the counters from them
    pub fn set_outcomes(&mut self, outcomes: Vec<VerificationOutcome>) {
        self.attempted = outcomes.len();
        self.succeeded = outcomes.iter().filter(|o| o.passed()).count();
        self.failed = self.attempted - self.succeeded;
        self.outcomes = outcomes;
    }

    pub fn failed_outcomes(&self) -> impl Iterator<Item = &VerificationOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    /// Completed with every record verified and a full read-back
    pub fn is_clean(&self) -> bool {
        self.status == RunStatus::Completed && self.failed == 0 && !self.partial
    }

    pub fn render(&self) -> String {
        let mut lines = vec![format!(
            "[{}] {} attempted={} succeeded={} failed={}",
            self.backend_name, self.status, self.attempted, self.succeeded, self.failed
        )];
        if let RunStatus::Failed { message, .. } = &self.status {
            lines.push(format!("    error: {}", message));
        }
        if let Some(read_error) = &self.read_error {
            lines.push(format!("    read incomplete: {}", read_error));
        }
        lines.extend(
            self.failed_outcomes()
                .map(|outcome| format!("    {}", outcome.describe_failure())),
        );
        lines.join("\n")
    }
}

/// Machine-readable digest of a run report, used by `--json` output
#[derive(Debug, Clone, Serialize)]
pub struct RunDigest {
    pub backend: String,
    pub kind: String,
    pub mode: &'static str,
    pub run_id: String,
    pub status: String,
    pub final_state: &'static str,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failed_records: Vec<String>,
    pub partial: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u128,
}

impl From<&RunReport> for RunDigest {
    fn from(report: &RunReport) -> Self {
        Self {
            backend: report.backend_name.clone(),
            kind: report.kind.clone(),
            mode: report.mode.as_str(),
            run_id: report.run_id.clone(),
            status: report.status.to_string(),
            final_state: report.final_state.as_str(),
            attempted: report.attempted,
            succeeded: report.succeeded,
            failed: report.failed,
            failed_records: report
                .failed_outcomes()
                .map(|o| o.record_id.clone())
                .collect(),
            partial: report.partial,
            started_at: report.started_at,
            duration_ms: report.duration.as_millis(),
        }
    }
}

/// All reports of one harness invocation and the process exit contract
#[derive(Debug, Clone, Default)]
pub struct HarnessSummary {
    pub reports: Vec<RunReport>,
}

impl HarnessSummary {
    pub fn new(reports: Vec<RunReport>) -> Self {
        Self { reports }
    }

    pub fn all_clean(&self) -> bool {
        self.reports.iter().all(RunReport::is_clean)
    }

    /// 0 iff every backend completed without failures
    pub fn exit_code(&self) -> i32 {
        if self.all_clean() {
            0
        } else {
            1
        }
    }

    pub fn first_fatal(&self) -> Option<&RunReport> {
        self.reports.iter().find(|r| r.status.is_fatal())
    }

    pub fn final_message(&self) -> String {
        if let Some(fatal) = self.first_fatal() {
            return format!(
                "FAILED: backend '{}' aborted ({})",
                fatal.backend_name, fatal.status
            );
        }
        let failing = self.reports.iter().filter(|r| !r.is_clean()).count();
        if failing > 0 {
            format!(
                "FAILED: {} of {} backends did not verify cleanly",
                failing,
                self.reports.len()
            )
        } else {
            format!("OK: {} backends verified", self.reports.len())
        }
    }

    pub fn render(&self) -> String {
        let mut out: Vec<String> = self.reports.iter().map(RunReport::render).collect();
        out.push(self.final_message());
        out.join("\n")
    }
}
