// src/transport/memory/document.rs - Simulated document database

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{page_keys, FaultPlan, SimulatedSession};
use crate::error::TransportError;
use crate::transport::{DocumentClient, Page, TransportResult};

struct Collection {
    partition_key: Option<String>,
    documents: DashMap<String, Value>,
}

#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    session: SimulatedSession,
    databases: Arc<DashSet<String>>,
    collections: Arc<DashMap<String, Arc<Collection>>>,
}

fn collection_key(database: &str, container: &str) -> String {
    format!("{}/{}", database, container)
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Arc<FaultPlan>) -> Self {
        Self {
            session: SimulatedSession::new(faults),
            ..Self::default()
        }
    }

    pub fn faults(&self) -> &Arc<FaultPlan> {
        self.session.faults()
    }

    pub fn document_count(&self, database: &str, container: &str) -> usize {
        self.collections
            .get(&collection_key(database, container))
            .map(|c| c.documents.len())
            .unwrap_or(0)
    }

    pub fn partition_key(&self, database: &str, container: &str) -> Option<String> {
        self.collections
            .get(&collection_key(database, container))
            .and_then(|c| c.partition_key.clone())
    }

    pub fn delete_document(&self, database: &str, container: &str, id: &str) -> bool {
        self.collections
            .get(&collection_key(database, container))
            .and_then(|c| c.documents.remove(id))
            .is_some()
    }

    /// Place a document directly, the way an external pipeline would
    pub fn insert_raw(&self, database: &str, container: &str, id: &str, document: Value) {
        self.databases.insert(database.to_string());
        self.collections
            .entry(collection_key(database, container))
            .or_insert_with(|| {
                Arc::new(Collection {
                    partition_key: None,
                    documents: DashMap::new(),
                })
            })
            .documents
            .insert(id.to_string(), document);
    }

    fn collection(&self, database: &str, container: &str) -> TransportResult<Arc<Collection>> {
        self.collections
            .get(&collection_key(database, container))
            .map(|c| c.value().clone())
            .ok_or_else(|| {
                TransportError::NotFound(format!("collection '{}/{}'", database, container))
            })
    }
}

#[async_trait]
impl DocumentClient for MemoryDocumentStore {
    async fn open(&self) -> TransportResult<()> {
        self.session.open()
    }

    async fn create_database(&self, database: &str) -> TransportResult<()> {
        self.session.ensure_open()?;
        self.faults().check_namespace(database)?;
        if self.databases.insert(database.to_string()) {
            debug!("Created simulated database {}", database);
            Ok(())
        } else {
            Err(TransportError::AlreadyExists(format!("database '{}'", database)))
        }
    }

    async fn create_container(
        &self,
        database: &str,
        container: &str,
        partition_key: Option<&str>,
    ) -> TransportResult<()> {
        self.session.ensure_open()?;
        if !self.databases.contains(database) {
            return Err(TransportError::NotFound(format!("database '{}'", database)));
        }
        match self.collections.entry(collection_key(database, container)) {
            Entry::Occupied(_) => Err(TransportError::AlreadyExists(format!(
                "collection '{}/{}'",
                database, container
            ))),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Collection {
                    partition_key: partition_key.map(str::to_string),
                    documents: DashMap::new(),
                }));
                Ok(())
            }
        }
    }

    async fn upsert_document(
        &self,
        database: &str,
        container: &str,
        id: &str,
        document: Value,
    ) -> TransportResult<()> {
        self.session.ensure_open()?;
        self.faults().check_write(id)?;
        let collection = self.collection(database, container)?;

        if let Some(path) = &collection.partition_key {
            let field = path.trim_start_matches('/');
            if document.get(field).is_none() {
                return Err(TransportError::Rejected(format!(
                    "document '{}' has no value for partition key {}",
                    id, path
                )));
            }
        }

        collection.documents.insert(id.to_string(), document);
        Ok(())
    }

    async fn query_documents(
        &self,
        database: &str,
        container: &str,
        continuation: Option<String>,
        max_items: usize,
    ) -> TransportResult<Page<Value>> {
        self.session.ensure_open()?;
        let collection = self.collection(database, container)?;
        self.faults().begin_page(continuation.is_none())?;

        let ids: Vec<String> = collection
            .documents
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        let (page, next) = page_keys(ids, continuation.as_deref(), self.faults().page_size(max_items));

        let mut items: Vec<Value> = page
            .iter()
            .filter_map(|id| collection.documents.get(id).map(|doc| doc.clone()))
            .collect();
        self.faults().arrange(&mut items);

        Ok(Page {
            items,
            continuation: next,
        })
    }

    async fn close(&self) {
        self.session.close();
    }
}
