// tests/helpers/backends.rs - Simulated backends that outlive a single connector

use std::sync::Arc;

use seedcheck::connector::{
    DocumentConnector, GraphConnector, KeyValueConnector, ObjectConnector, QueueConnector,
    TableConnector, WideColumnConnector,
};
use seedcheck::transport::memory::{
    FaultPlan, MemoryDocumentStore, MemoryGraphStore, MemoryKeyValueStore, MemoryObjectStore,
    MemoryQueueStore, MemoryTableStore, MemoryWideColumnStore,
};
use seedcheck::{BackendConfig, BackendKind, Config, Connector, ConnectorOptions, RunMode};

/// The simulated store behind a backend, kept so tests can inspect or
/// tamper with stored data between runs
#[derive(Clone)]
pub enum StoreHandle {
    Object(MemoryObjectStore),
    KeyValue(MemoryKeyValueStore),
    Document(MemoryDocumentStore),
    WideColumn(MemoryWideColumnStore),
    Graph(MemoryGraphStore),
    Queue(MemoryQueueStore),
    Table(MemoryTableStore),
}

impl StoreHandle {
    fn for_kind(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Blob | BackendKind::DataLake => StoreHandle::Object(MemoryObjectStore::new()),
            BackendKind::KeyValue => StoreHandle::KeyValue(MemoryKeyValueStore::new()),
            BackendKind::CosmosSql | BackendKind::Mongo => {
                StoreHandle::Document(MemoryDocumentStore::new())
            }
            BackendKind::Cassandra => StoreHandle::WideColumn(MemoryWideColumnStore::new()),
            BackendKind::Gremlin => StoreHandle::Graph(MemoryGraphStore::new()),
            BackendKind::Queue => StoreHandle::Queue(MemoryQueueStore::new()),
            BackendKind::Table => StoreHandle::Table(MemoryTableStore::new()),
        }
    }
}

pub struct SimulatedBackend {
    pub config: BackendConfig,
    pub store: StoreHandle,
}

impl SimulatedBackend {
    pub fn new(config: BackendConfig) -> Self {
        let kind = config.kind().expect("preset kinds parse");
        Self {
            store: StoreHandle::for_kind(kind),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn kind(&self) -> BackendKind {
        self.config.kind().expect("preset kinds parse")
    }

    pub fn connector(&self) -> Box<dyn Connector> {
        self.connector_with(ConnectorOptions::default())
    }

    /// A fresh connector over the same stored data
    pub fn connector_with(&self, options: ConnectorOptions) -> Box<dyn Connector> {
        let config = self.config.clone();
        let kind = self.kind();
        match &self.store {
            StoreHandle::Object(store) => Box::new(
                ObjectConnector::new(config, kind, options, Arc::new(store.clone()))
                    .expect("object layout"),
            ),
            StoreHandle::KeyValue(store) => Box::new(KeyValueConnector::new(
                config,
                options,
                Arc::new(store.clone()),
            )),
            StoreHandle::Document(store) => Box::new(
                DocumentConnector::new(config, kind, options, Arc::new(store.clone()))
                    .expect("document layout"),
            ),
            StoreHandle::WideColumn(store) => Box::new(WideColumnConnector::new(
                config,
                options,
                Arc::new(store.clone()),
            )),
            StoreHandle::Graph(store) => Box::new(GraphConnector::new(
                config,
                options,
                Arc::new(store.clone()),
            )),
            StoreHandle::Queue(store) => Box::new(QueueConnector::new(
                config,
                options,
                Arc::new(store.clone()),
            )),
            StoreHandle::Table(store) => Box::new(TableConnector::new(
                config,
                options,
                Arc::new(store.clone()),
            )),
        }
    }

    pub fn faults(&self) -> Arc<FaultPlan> {
        match &self.store {
            StoreHandle::Object(store) => store.faults().clone(),
            StoreHandle::KeyValue(store) => store.faults().clone(),
            StoreHandle::Document(store) => store.faults().clone(),
            StoreHandle::WideColumn(store) => store.faults().clone(),
            StoreHandle::Graph(store) => store.faults().clone(),
            StoreHandle::Queue(store) => store.faults().clone(),
            StoreHandle::Table(store) => store.faults().clone(),
        }
    }

    fn setting(&self, key: &str) -> &str {
        self.config.setting(key).expect("preset setting present")
    }

    /// Delete one record straight from the store, behind the connector's back
    pub fn remove_record(&self, external_id: &str) -> bool {
        match &self.store {
            StoreHandle::Object(store) => match self.kind() {
                BackendKind::DataLake => store.delete_object(
                    self.setting("filesystem_name"),
                    &format!("{}/{}.json", self.setting("directory_name").trim_matches('/'), external_id),
                ),
                _ => store.delete_object(
                    self.setting("container_name"),
                    &format!("samples/{}.json", external_id),
                ),
            },
            StoreHandle::KeyValue(store) => store.delete(&format!(
                "{}:{}",
                self.setting("key_prefix").trim_end_matches(':'),
                external_id
            )),
            StoreHandle::Document(store) => {
                let container = match self.kind() {
                    BackendKind::Mongo => self.setting("collection_name"),
                    _ => self.setting("container_name"),
                };
                store.delete_document(self.setting("database_name"), container, external_id)
            }
            StoreHandle::WideColumn(store) => store.delete_row(
                &format!("{}.{}", self.setting("keyspace"), self.setting("table_name")),
                external_id,
            ),
            StoreHandle::Graph(store) => store.drop_vertex(self.setting("graph_name"), external_id),
            StoreHandle::Queue(store) => {
                store.purge_matching(self.setting("queue_name"), &format!("\"{}\"", external_id)) > 0
            }
            StoreHandle::Table(store) => {
                store.delete_entity(self.setting("table_name"), "seed", external_id)
            }
        }
    }
}

/// One simulated backend per seeding preset (verify-only presets excluded)
pub fn simulated_backends() -> Vec<SimulatedBackend> {
    Config::sample()
        .backends
        .into_iter()
        .filter(|b| b.mode == RunMode::SeedAndVerify)
        .map(SimulatedBackend::new)
        .collect()
}

pub fn simulated_backend(kind: BackendKind) -> SimulatedBackend {
    simulated_backends()
        .into_iter()
        .find(|b| b.kind() == kind)
        .expect("a seeding preset exists for every kind")
}
