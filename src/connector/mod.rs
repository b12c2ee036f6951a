// src/connector/mod.rs - Backend connector trait, backend kinds and factory

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{BackendConfig, HarnessConfig};
use crate::error::{HarnessError, Result};
use crate::record::{BackendRecord, SampleRecord};
use crate::transport::memory::{
    MemoryDocumentStore, MemoryGraphStore, MemoryKeyValueStore, MemoryObjectStore,
    MemoryQueueStore, MemoryTableStore, MemoryWideColumnStore,
};
use crate::transport::table_rest::AzureTableRestClient;

pub mod blob;
pub mod document;
pub mod graph;
pub mod key_value;
mod paging;
pub mod queue;
mod session;
pub mod table;
pub mod wide_column;

pub use blob::ObjectConnector;
pub use document::DocumentConnector;
pub use graph::GraphConnector;
pub use key_value::KeyValueConnector;
pub use queue::QueueConnector;
pub use table::TableConnector;
pub use wide_column::WideColumnConnector;

/// Backend kinds a connector can be created for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Blob,
    DataLake,
    KeyValue,
    CosmosSql,
    Mongo,
    Cassandra,
    Gremlin,
    Queue,
    Table,
}

impl BackendKind {
    pub fn all() -> &'static [BackendKind] {
        &[
            BackendKind::Blob,
            BackendKind::DataLake,
            BackendKind::KeyValue,
            BackendKind::CosmosSql,
            BackendKind::Mongo,
            BackendKind::Cassandra,
            BackendKind::Gremlin,
            BackendKind::Queue,
            BackendKind::Table,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Blob => "blob",
            BackendKind::DataLake => "data_lake",
            BackendKind::KeyValue => "key_value",
            BackendKind::CosmosSql => "cosmos_sql",
            BackendKind::Mongo => "mongo",
            BackendKind::Cassandra => "cassandra",
            BackendKind::Gremlin => "gremlin",
            BackendKind::Queue => "queue",
            BackendKind::Table => "table",
        }
    }

    /// Connector family that serves this kind
    pub fn family(&self) -> &'static str {
        match self {
            BackendKind::Blob | BackendKind::DataLake => "object",
            BackendKind::KeyValue => "key-value",
            BackendKind::CosmosSql | BackendKind::Mongo => "document",
            BackendKind::Cassandra => "wide-column",
            BackendKind::Gremlin => "graph",
            BackendKind::Queue => "queue",
            BackendKind::Table => "table",
        }
    }

    /// Settings that must be present and non-empty before connecting
    pub fn required_settings(&self) -> &'static [&'static str] {
        match self {
            BackendKind::Blob => &["connection_string", "container_name"],
            BackendKind::DataLake => &[
                "account_name",
                "account_key",
                "filesystem_name",
                "directory_name",
            ],
            BackendKind::KeyValue => &["connection_string", "key_prefix"],
            BackendKind::CosmosSql => &[
                "endpoint_uri",
                "primary_key",
                "database_name",
                "container_name",
            ],
            BackendKind::Mongo => &["connection_string", "database_name", "collection_name"],
            BackendKind::Cassandra => &[
                "contact_point",
                "port",
                "username",
                "password",
                "keyspace",
                "table_name",
            ],
            BackendKind::Gremlin => &["hostname", "primary_key", "database_name", "graph_name"],
            BackendKind::Queue => &["connection_string", "queue_name"],
            BackendKind::Table => &["connection_string", "table_name"],
        }
    }

    /// Whether this build ships a live transport for the kind
    pub fn supports_live(&self) -> bool {
        match self {
            BackendKind::Table => true,
            BackendKind::Mongo => cfg!(feature = "mongodb"),
            _ => false,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        BackendKind::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| HarnessError::Config(format!("Unknown backend kind: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// In-process simulated backend
    Memory,
    /// Network client talking to the real service
    Live,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Memory => "memory",
            TransportKind::Live => "live",
        }
    }
}

impl FromStr for TransportKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "memory" => Ok(TransportKind::Memory),
            "live" => Ok(TransportKind::Live),
            other => Err(HarnessError::Config(format!("Unknown transport: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Failed,
}

/// Result of writing one sample record
#[derive(Debug, Clone, PartialEq)]
pub struct SeedOutcome {
    pub record_id: String,
    pub error: Option<String>,
}

/// Per-record outcomes of a seed batch. A failed record never aborts the batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedReport {
    pub outcomes: Vec<SeedOutcome>,
}

impl SeedReport {
    pub fn record<E: fmt::Display>(&mut self, record_id: &str, result: std::result::Result<(), E>) {
        let error = match result {
            Ok(()) => None,
            Err(e) => {
                warn!(record_id = %record_id, error = %e, "Write failed");
                Some(e.to_string())
            }
        };
        self.outcomes.push(SeedOutcome {
            record_id: record_id.to_string(),
            error,
        });
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_none()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    pub fn error_for(&self, record_id: &str) -> Option<&str> {
        self.outcomes
            .iter()
            .rev()
            .find(|o| o.record_id == record_id)
            .and_then(|o| o.error.as_deref())
    }
}

/// Harness-wide knobs every connector receives
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorOptions {
    pub page_size: usize,
    pub step_timeout: Duration,
    pub visibility_timeout: Duration,
}

impl ConnectorOptions {
    pub fn from_harness(harness: &HarnessConfig) -> Self {
        Self {
            page_size: harness.page_size,
            step_timeout: Duration::from_secs(harness.step_timeout_seconds),
            visibility_timeout: Duration::from_secs(harness.visibility_timeout_seconds),
        }
    }
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self::from_harness(&HarnessConfig::default())
    }
}

/// Lazily paged read-back of every record a backend holds
pub type RecordStream<'a> = BoxStream<'a, Result<BackendRecord>>;

/// One backend, adapted to the uniform seed-and-verify lifecycle
#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> BackendKind;

    fn state(&self) -> ConnectionState;

    /// Target namespace (container, table, keyspace...) once connected
    fn namespace(&self) -> Option<String>;

    /// Validate settings, then open a session. Idempotent.
    async fn connect(&mut self) -> Result<()>;

    /// Create the target namespace if it does not exist
    async fn ensure_namespace(&mut self) -> Result<()>;

    /// Upsert every record; per-record failures land in the report
    async fn seed(&mut self, records: &[SampleRecord]) -> Result<SeedReport>;

    /// Enumerate every stored record across all pages. Restartable.
    fn read_all(&self) -> RecordStream<'_>;

    /// Release the session. Idempotent and infallible.
    async fn disconnect(&mut self);
}

/// Factory function to create a connector based on backend configuration
pub fn create_connector(
    config: &BackendConfig,
    options: &ConnectorOptions,
) -> Result<Box<dyn Connector>> {
    let kind = config.kind()?;
    let transport = config.transport()?;
    let options = options.clone();
    let backend = config.clone();

    info!(
        backend = %config.name,
        kind = %kind,
        transport = transport.as_str(),
        "Creating {} connector",
        kind.family()
    );

    let connector: Box<dyn Connector> = match (kind, transport) {
        (BackendKind::Blob | BackendKind::DataLake, TransportKind::Memory) => Box::new(
            ObjectConnector::new(backend, kind, options, Arc::new(MemoryObjectStore::new()))?,
        ),
        (BackendKind::KeyValue, TransportKind::Memory) => Box::new(KeyValueConnector::new(
            backend,
            options,
            Arc::new(MemoryKeyValueStore::new()),
        )),
        (BackendKind::CosmosSql | BackendKind::Mongo, TransportKind::Memory) => Box::new(
            DocumentConnector::new(backend, kind, options, Arc::new(MemoryDocumentStore::new()))?,
        ),
        (BackendKind::Cassandra, TransportKind::Memory) => Box::new(WideColumnConnector::new(
            backend,
            options,
            Arc::new(MemoryWideColumnStore::new()),
        )),
        (BackendKind::Gremlin, TransportKind::Memory) => Box::new(GraphConnector::new(
            backend,
            options,
            Arc::new(MemoryGraphStore::new()),
        )),
        (BackendKind::Queue, TransportKind::Memory) => Box::new(QueueConnector::new(
            backend,
            options,
            Arc::new(MemoryQueueStore::new()),
        )),
        (BackendKind::Table, TransportKind::Memory) => Box::new(TableConnector::new(
            backend,
            options,
            Arc::new(MemoryTableStore::new()),
        )),
        (BackendKind::Table, TransportKind::Live) => {
            let client = AzureTableRestClient::new(
                config.setting("connection_string").map(str::to_string),
                options.step_timeout,
            )
            .map_err(|e| HarnessError::Config(e.to_string()))?;
            Box::new(TableConnector::new(backend, options, Arc::new(client)))
        }
        #[cfg(feature = "mongodb")]
        (BackendKind::Mongo, TransportKind::Live) => {
            let client = crate::transport::mongo::MongoDocumentClient::new(
                config.setting("connection_string").map(str::to_string),
            );
            Box::new(DocumentConnector::new(backend, kind, options, Arc::new(client))?)
        }
        #[cfg(not(feature = "mongodb"))]
        (BackendKind::Mongo, TransportKind::Live) => {
            return Err(HarnessError::Config(
                "MongoDB support not compiled in. Enable 'mongodb' feature.".to_string(),
            ));
        }
        (kind, TransportKind::Live) => {
            return Err(HarnessError::Config(format!(
                "No live transport available for backend kind '{}'; use transport = \"memory\"",
                kind
            )));
        }
    };

    Ok(connector)
}
