// src/harness/mod.rs - Drives connect, seed, read-back and verify for each backend

use futures::stream::{self, StreamExt};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{BackendConfig, Config, RunMode};
use crate::connector::{create_connector, Connector, ConnectorOptions, SeedReport};
use crate::dataset::SampleDataset;
use crate::error::{HarnessError, Result};
use crate::metrics::HarnessMetrics;
use crate::record::BackendRecord;
use crate::report::{self, RunReport, RunStatus};
use crate::shutdown::ShutdownSignal;

pub mod state;

pub use state::{RunState, RunStateMachine};

/// Keep the newest representation of `record`'s id. A higher version wins;
/// with equal or missing versions the later arrival wins.
pub fn merge_latest(materialized: &mut HashMap<String, BackendRecord>, record: BackendRecord) {
    match materialized.entry(record.external_id.clone()) {
        Entry::Vacant(slot) => {
            slot.insert(record);
        }
        Entry::Occupied(mut slot) => {
            if record.version >= slot.get().version {
                slot.insert(record);
            }
        }
    }
}

/// One backend scheduled for a run. A connector that failed to build is
/// carried along so it still produces a report.
pub struct RunPlan {
    name: String,
    kind: String,
    mode: RunMode,
    connector: Result<Box<dyn Connector>>,
}

impl RunPlan {
    pub fn new(connector: Box<dyn Connector>, mode: RunMode) -> Self {
        Self {
            name: connector.name().to_string(),
            kind: connector.kind().as_str().to_string(),
            mode,
            connector: Ok(connector),
        }
    }

    pub fn from_config(config: &BackendConfig, options: &ConnectorOptions) -> Self {
        Self {
            name: config.name.clone(),
            kind: config.kind.clone(),
            mode: config.mode,
            connector: create_connector(config, options),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// What a run carried between steps; folded into the report at the end
#[derive(Default)]
struct RunProgress {
    namespace: Option<String>,
    seed: SeedReport,
    outcomes: Option<Vec<report::VerificationOutcome>>,
    read_error: Option<String>,
}

#[derive(Clone)]
pub struct Orchestrator {
    dataset: Arc<SampleDataset>,
    metrics: Option<Arc<HarnessMetrics>>,
    shutdown: ShutdownSignal,
}

impl Orchestrator {
    pub fn new(dataset: Arc<SampleDataset>) -> Self {
        Self {
            dataset,
            metrics: None,
            shutdown: ShutdownSignal::never(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<HarnessMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn dataset(&self) -> &Arc<SampleDataset> {
        &self.dataset
    }

    /// Build a plan for every enabled backend, in configuration order
    pub fn plan(config: &Config) -> Vec<RunPlan> {
        let options = ConnectorOptions::from_harness(&config.harness);
        config
            .enabled_backends()
            .map(|backend| RunPlan::from_config(backend, &options))
            .collect()
    }

    /// Run every plan with at most `max_concurrency` backends in flight.
    /// Reports come back in plan order.
    pub async fn run_all(&self, plans: Vec<RunPlan>, max_concurrency: usize) -> Vec<RunReport> {
        info!(
            backends = plans.len(),
            max_concurrency = max_concurrency,
            "🚀 Starting harness run"
        );

        let mut reports: Vec<(usize, RunReport)> = stream::iter(plans.into_iter().enumerate())
            .map(|(index, plan)| async move { (index, self.execute(plan).await) })
            .buffer_unordered(max_concurrency.max(1))
            .collect()
            .await;

        reports.sort_by_key(|(index, _)| *index);
        reports.into_iter().map(|(_, report)| report).collect()
    }

    async fn execute(&self, plan: RunPlan) -> RunReport {
        match plan.connector {
            Ok(mut connector) => self.run(connector.as_mut(), plan.mode).await,
            Err(e) => {
                error!(backend = %plan.name, error = %e, "❌ Could not create connector");
                let report = RunReport::aborted(plan.name, plan.kind, plan.mode, &e);
                self.record_metrics(&report);
                report
            }
        }
    }

    /// Run the full lifecycle against one connector. Always disconnects
    /// exactly once, whatever happened before.
    pub async fn run(&self, connector: &mut dyn Connector, mode: RunMode) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::new(connector.name(), connector.kind().as_str(), mode);
        let mut machine = RunStateMachine::new();
        let mut progress = RunProgress::default();

        info!(
            backend = %report.backend_name,
            kind = %report.kind,
            mode = mode.as_str(),
            run_id = %report.run_id,
            "▶️  Starting backend run"
        );

        let result = self
            .drive(connector, mode, &mut machine, &mut progress)
            .await;

        connector.disconnect().await;
        machine.close();

        report.namespace = progress.namespace;
        report.seed = progress.seed;
        report.read_error = progress.read_error;
        report.partial = report.read_error.is_some();
        if let Some(outcomes) = progress.outcomes {
            report.set_outcomes(outcomes);
        }
        if let Err(e) = &result {
            report.status = RunStatus::from_error(e);
        }
        report.final_state = machine.state();
        report.duration = started.elapsed();

        match &report.status {
            RunStatus::Completed if report.is_clean() => info!(
                backend = %report.backend_name,
                verified = report.succeeded,
                duration_ms = report.duration.as_millis() as u64,
                "✅ Backend verified"
            ),
            RunStatus::Completed => warn!(
                backend = %report.backend_name,
                succeeded = report.succeeded,
                failed = report.failed,
                partial = report.partial,
                "⚠️  Backend verified with failures"
            ),
            RunStatus::Cancelled => warn!(backend = %report.backend_name, "🛑 Backend run cancelled"),
            RunStatus::Failed { message, .. } => {
                error!(backend = %report.backend_name, error = %message, "❌ Backend run failed")
            }
        }

        self.record_metrics(&report);
        report
    }

    async fn drive(
        &self,
        connector: &mut dyn Connector,
        mode: RunMode,
        machine: &mut RunStateMachine,
        progress: &mut RunProgress,
    ) -> Result<()> {
        self.checkpoint()?;
        machine.advance(RunState::Connecting)?;
        let connected = self.timed_step("connect", connector.connect()).await;
        if let Err(e) = connected {
            machine.fail();
            return Err(e);
        }
        machine.advance(RunState::Connected)?;
        progress.namespace = connector.namespace();

        if let Err(e) = self.prepare_data(connector, mode, machine, progress).await {
            machine.fail();
            return Err(e);
        }

        self.checkpoint().map_err(|e| {
            machine.fail();
            e
        })?;
        let materialized = self.read_back(connector, progress).await;

        let mut outcomes = report::verify(&self.dataset, &materialized);
        for outcome in &mut outcomes {
            outcome.write_error = progress.seed.error_for(&outcome.record_id).map(str::to_string);
        }
        progress.outcomes = Some(outcomes);
        machine.advance(RunState::Verified)?;
        Ok(())
    }

    /// EnsureNamespace and Seed; a verify-only run passes through both states
    async fn prepare_data(
        &self,
        connector: &mut dyn Connector,
        mode: RunMode,
        machine: &mut RunStateMachine,
        progress: &mut RunProgress,
    ) -> Result<()> {
        if mode == RunMode::VerifyOnly {
            debug!(backend = %connector.name(), "Verify-only run, skipping namespace and seed");
            machine.advance(RunState::SchemaReady)?;
            machine.advance(RunState::Seeded)?;
            return Ok(());
        }

        self.checkpoint()?;
        self.timed_step("ensure_namespace", connector.ensure_namespace())
            .await?;
        machine.advance(RunState::SchemaReady)?;

        self.checkpoint()?;
        let seed = self
            .timed_step("seed", connector.seed(self.dataset.records()))
            .await?;
        info!(
            backend = %connector.name(),
            attempted = seed.attempted(),
            succeeded = seed.succeeded(),
            "🌱 Seeded sample records"
        );
        progress.seed = seed;
        machine.advance(RunState::Seeded)?;

        let seed = &progress.seed;
        if seed.attempted() > 0 && seed.succeeded() == 0 {
            progress.outcomes = Some(report::unverified(&self.dataset, seed));
            let first = &seed.outcomes[0];
            return Err(HarnessError::Write {
                record_id: first.record_id.clone(),
                message: format!(
                    "none of {} writes succeeded; first error: {}",
                    seed.attempted(),
                    first.error.as_deref().unwrap_or("unknown")
                ),
            });
        }
        Ok(())
    }

    /// Drain the connector's record stream into a map keyed by external id.
    /// A read error keeps what was read so far.
    async fn read_back(
        &self,
        connector: &dyn Connector,
        progress: &mut RunProgress,
    ) -> HashMap<String, BackendRecord> {
        let started = Instant::now();
        let mut materialized = HashMap::new();
        let mut read = 0usize;
        let mut records = connector.read_all();

        while let Some(item) = records.next().await {
            match item {
                Ok(record) => {
                    read += 1;
                    merge_latest(&mut materialized, record);
                }
                Err(e) => {
                    warn!(backend = %connector.name(), error = %e, read = read, "Read-back stopped early");
                    progress.read_error = Some(e.to_string());
                    break;
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.observe_step("read_all", started.elapsed());
        }
        debug!(
            backend = %connector.name(),
            read = read,
            distinct = materialized.len(),
            "🔍 Read back stored records"
        );
        materialized
    }

    fn checkpoint(&self) -> Result<()> {
        match self.shutdown.reason() {
            Some(reason) => {
                debug!(reason = ?reason, "Shutdown requested, stopping run");
                Err(HarnessError::Cancelled)
            }
            None => Ok(()),
        }
    }

    async fn timed_step<T, F>(&self, step: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let result = fut.await;
        if let Some(metrics) = &self.metrics {
            metrics.observe_step(step, started.elapsed());
        }
        result
    }

    fn record_metrics(&self, report: &RunReport) {
        if let Some(metrics) = &self.metrics {
            metrics.record_run(&report.backend_name, report.status.as_str());
            metrics.record_seeded(&report.backend_name, report.seed.succeeded(), report.seed.failed());
            if report.attempted > 0 {
                metrics.record_verified(&report.backend_name, report.succeeded, report.failed);
            }
        }
    }
}
