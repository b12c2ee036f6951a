// src/lib.rs - Seed-and-verify harness for heterogeneous storage backends

pub mod config;
pub mod connector;
pub mod dataset;
pub mod error;
pub mod harness;
pub mod metrics;
pub mod record;
pub mod report;
pub mod shutdown;
pub mod transport;

// Re-export commonly used items for convenience
pub use config::{BackendConfig, Config, HarnessConfig, RunMode};
pub use connector::{
    create_connector, BackendKind, ConnectionState, Connector, ConnectorOptions, SeedReport,
    TransportKind,
};
pub use dataset::SampleDataset;
pub use error::{ConnectFailure, ErrorCategory, HarnessError, Result, TransportError};
pub use harness::{Orchestrator, RunPlan, RunState, RunStateMachine};
pub use metrics::HarnessMetrics;
pub use record::{BackendRecord, FieldValue, SampleRecord};
pub use report::{HarnessSummary, RunReport, RunStatus, VerificationOutcome};
pub use shutdown::{ShutdownCoordinator, ShutdownReason, ShutdownSignal};

/// Seedcheck version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Feature flags available in this build
#[derive(Debug, Clone)]
pub struct Features {
    pub cli: bool,
    pub mongodb: bool,
}

impl Features {
    pub fn new() -> Self {
        Self {
            cli: cfg!(feature = "cli"),
            mongodb: cfg!(feature = "mongodb"),
        }
    }

    pub fn list_enabled(&self) -> Vec<&'static str> {
        let mut features = Vec::new();
        if self.cli {
            features.push("cli");
        }
        if self.mongodb {
            features.push("mongodb");
        }
        features
    }

    /// Backend kinds this build can reach over the network
    pub fn live_backends(&self) -> Vec<&'static str> {
        BackendKind::all()
            .iter()
            .filter(|kind| kind.supports_live())
            .map(|kind| kind.as_str())
            .collect()
    }
}

impl Default for Features {
    fn default() -> Self {
        Self::new()
    }
}

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        BackendConfig, BackendKind, Config, Connector, HarnessError, Orchestrator, Result,
        RunMode, RunReport, SampleDataset,
    };
}
