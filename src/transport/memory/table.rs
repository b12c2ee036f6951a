// src/transport/memory/table.rs - Simulated Azure Table service

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use super::{FaultPlan, SimulatedSession};
use crate::error::TransportError;
use crate::transport::{Page, TableClient, TableContinuation, TableEntity, TransportResult};

type EntityKey = (String, String);

#[derive(Clone, Default)]
pub struct MemoryTableStore {
    session: SimulatedSession,
    tables: Arc<DashMap<String, Arc<DashMap<EntityKey, TableEntity>>>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Arc<FaultPlan>) -> Self {
        Self {
            session: SimulatedSession::new(faults),
            tables: Arc::new(DashMap::new()),
        }
    }

    pub fn faults(&self) -> &Arc<FaultPlan> {
        self.session.faults()
    }

    pub fn entity_count(&self, table: &str) -> usize {
        self.tables.get(table).map(|t| t.len()).unwrap_or(0)
    }

    pub fn delete_entity(&self, table: &str, partition_key: &str, row_key: &str) -> bool {
        self.tables
            .get(table)
            .and_then(|t| t.remove(&(partition_key.to_string(), row_key.to_string())))
            .is_some()
    }

    fn table(&self, table: &str) -> TransportResult<Arc<DashMap<EntityKey, TableEntity>>> {
        self.tables
            .get(table)
            .map(|t| t.value().clone())
            .ok_or_else(|| TransportError::NotFound(format!("table '{}'", table)))
    }
}

#[async_trait]
impl TableClient for MemoryTableStore {
    async fn open(&self) -> TransportResult<()> {
        self.session.open()
    }

    async fn create_table(&self, table: &str) -> TransportResult<()> {
        self.session.ensure_open()?;
        self.faults().check_namespace(table)?;
        match self.tables.entry(table.to_string()) {
            Entry::Occupied(_) => Err(TransportError::AlreadyExists(format!("table '{}'", table))),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(DashMap::new()));
                Ok(())
            }
        }
    }

    async fn upsert_entity(&self, table: &str, entity: &TableEntity) -> TransportResult<()> {
        self.session.ensure_open()?;
        self.faults().check_write(&entity.row_key)?;
        self.table(table)?.insert(
            (entity.partition_key.clone(), entity.row_key.clone()),
            entity.clone(),
        );
        Ok(())
    }

    async fn query_entities(
        &self,
        table: &str,
        continuation: Option<TableContinuation>,
        top: usize,
    ) -> TransportResult<Page<TableEntity, TableContinuation>> {
        self.session.ensure_open()?;
        let entities = self.table(table)?;
        self.faults().begin_page(continuation.is_none())?;

        let mut keys: Vec<EntityKey> = entities.iter().map(|e| e.key().clone()).collect();
        keys.sort();

        let start = match &continuation {
            Some(token) => {
                let resume = (
                    token.next_partition_key.clone(),
                    token.next_row_key.clone().unwrap_or_default(),
                );
                keys.partition_point(|k| *k < resume)
            }
            None => 0,
        };
        let end = (start + self.faults().page_size(top)).min(keys.len());

        let mut items: Vec<TableEntity> = keys[start..end]
            .iter()
            .filter_map(|key| entities.get(key).map(|e| e.clone()))
            .collect();
        self.faults().arrange(&mut items);

        let next = keys.get(end).map(|(partition_key, row_key)| TableContinuation {
            next_partition_key: partition_key.clone(),
            next_row_key: Some(row_key.clone()),
        });

        Ok(Page {
            items,
            continuation: next,
        })
    }

    async fn close(&self) {
        self.session.close();
    }
}
