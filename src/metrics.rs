// src/metrics.rs - Prometheus counters for harness runs

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct HarnessMetrics {
    pub registry: Arc<Registry>,

    pub runs_total: IntCounterVec,
    pub records_seeded_total: IntCounterVec,
    pub records_verified_total: IntCounterVec,
    pub step_duration: HistogramVec,
}

impl HarnessMetrics {
    /// Build a fresh registry. Each orchestrator owns its own so parallel
    /// test runs never collide on metric names.
    pub fn new() -> prometheus::Result<Arc<Self>> {
        let registry = Registry::new();

        let runs_total = IntCounterVec::new(
            Opts::new("seedcheck_runs_total", "Backend runs by final status"),
            &["backend", "status"],
        )?;

        let records_seeded_total = IntCounterVec::new(
            Opts::new(
                "seedcheck_records_seeded_total",
                "Sample records written, by result",
            ),
            &["backend", "result"],
        )?;

        let records_verified_total = IntCounterVec::new(
            Opts::new(
                "seedcheck_records_verified_total",
                "Sample records verified after read-back, by result",
            ),
            &["backend", "result"],
        )?;

        let step_duration = HistogramVec::new(
            HistogramOpts::new(
                "seedcheck_step_duration_seconds",
                "Duration of lifecycle steps in seconds",
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
            &["step"],
        )?;

        registry.register(Box::new(runs_total.clone()))?;
        registry.register(Box::new(records_seeded_total.clone()))?;
        registry.register(Box::new(records_verified_total.clone()))?;
        registry.register(Box::new(step_duration.clone()))?;

        Ok(Arc::new(Self {
            registry: Arc::new(registry),
            runs_total,
            records_seeded_total,
            records_verified_total,
            step_duration,
        }))
    }

    pub fn record_run(&self, backend: &str, status: &str) {
        self.runs_total.with_label_values(&[backend, status]).inc();
    }

    pub fn record_seeded(&self, backend: &str, succeeded: usize, failed: usize) {
        self.records_seeded_total
            .with_label_values(&[backend, "ok"])
            .inc_by(succeeded as u64);
        self.records_seeded_total
            .with_label_values(&[backend, "error"])
            .inc_by(failed as u64);
    }

    pub fn record_verified(&self, backend: &str, passed: usize, failed: usize) {
        self.records_verified_total
            .with_label_values(&[backend, "pass"])
            .inc_by(passed as u64);
        self.records_verified_total
            .with_label_values(&[backend, "fail"])
            .inc_by(failed as u64);
    }

    pub fn observe_step(&self, step: &str, duration: Duration) {
        self.step_duration
            .with_label_values(&[step])
            .observe(duration.as_secs_f64());
    }

    /// Prometheus text exposition of everything recorded so far
    pub fn gather_text(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
