// src/transport/memory/wide_column.rs - Simulated CQL keyspace/table store

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::{page_keys, FaultPlan, SimulatedSession};
use crate::error::TransportError;
use crate::transport::{CqlRow, CqlValue, Page, TableSchema, TransportResult, WideColumnClient};

struct StoredTable {
    schema: TableSchema,
    rows: DashMap<String, CqlRow>,
}

#[derive(Clone, Default)]
pub struct MemoryWideColumnStore {
    session: SimulatedSession,
    keyspaces: Arc<DashMap<String, u32>>,
    tables: Arc<DashMap<String, Arc<StoredTable>>>,
}

impl MemoryWideColumnStore {
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

    pub fn replication_factor(&self, keyspace: &str) -> Option<u32> {
        self.keyspaces.get(keyspace).map(|rf| *rf)
    }

    pub fn row_count(&self, qualified_table: &str) -> usize {
        self.tables
            .get(qualified_table)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    pub fn delete_row(&self, qualified_table: &str, key: &str) -> bool {
        self.tables
            .get(qualified_table)
            .and_then(|t| t.rows.remove(key))
            .is_some()
    }

    fn table(&self, schema: &TableSchema) -> TransportResult<Arc<StoredTable>> {
        let name = schema.qualified_name();
        self.tables
            .get(&name)
            .map(|t| t.value().clone())
            .ok_or_else(|| TransportError::NotFound(format!("table '{}'", name)))
    }
}

/// Reject rows the stored schema cannot hold, like a CQL coordinator would
fn check_row(schema: &TableSchema, row: &CqlRow) -> TransportResult<String> {
    for (column, value) in row {
        let declared = schema.column_type(column).ok_or_else(|| {
            TransportError::Rejected(format!("undefined column name {}", column))
        })?;
        if let Some(actual) = value.cql_type() {
            if actual != declared {
                return Err(TransportError::Rejected(format!(
                    "invalid type for column {}: expected {}, got {}",
                    column,
                    declared.as_cql(),
                    actual.as_cql()
                )));
            }
        }
    }

    match row.get(&schema.primary_key) {
        Some(CqlValue::Text(key)) => Ok(key.clone()),
        Some(CqlValue::Int(key)) => Ok(key.to_string()),
        Some(CqlValue::BigInt(key)) => Ok(key.to_string()),
        _ => Err(TransportError::Rejected(format!(
            "missing primary key column {}",
            schema.primary_key
        ))),
    }
}

#[async_trait]
impl WideColumnClient for MemoryWideColumnStore {
    async fn open(&self) -> TransportResult<()> {
        self.session.open()
    }

    async fn create_keyspace(&self, keyspace: &str, replication_factor: u32) -> TransportResult<()> {
        self.session.ensure_open()?;
        self.faults().check_namespace(keyspace)?;
        debug!(
            "{}",
            TableSchema::create_keyspace_statement(keyspace, replication_factor)
        );
        // IF NOT EXISTS: an existing keyspace keeps its replication settings
        self.keyspaces
            .entry(keyspace.to_string())
            .or_insert(replication_factor);
        Ok(())
    }

    async fn create_table(&self, schema: &TableSchema) -> TransportResult<()> {
        self.session.ensure_open()?;
        if !self.keyspaces.contains_key(&schema.keyspace) {
            return Err(TransportError::NotFound(format!(
                "keyspace '{}'",
                schema.keyspace
            )));
        }
        debug!("{}", schema.create_table_statement());
        self.tables
            .entry(schema.qualified_name())
            .or_insert_with(|| {
                Arc::new(StoredTable {
                    schema: schema.clone(),
                    rows: DashMap::new(),
                })
            });
        Ok(())
    }

    async fn insert_row(&self, schema: &TableSchema, row: CqlRow) -> TransportResult<()> {
        self.session.ensure_open()?;
        let table = self.table(schema)?;
        let key = check_row(&table.schema, &row)?;
        self.faults().check_write(&key)?;
        table.rows.insert(key, row);
        Ok(())
    }

    async fn select_page(
        &self,
        schema: &TableSchema,
        paging_state: Option<Vec<u8>>,
        page_size: usize,
    ) -> TransportResult<Page<CqlRow, Vec<u8>>> {
        self.session.ensure_open()?;
        let table = self.table(schema)?;
        self.faults().begin_page(paging_state.is_none())?;

        let token = match paging_state {
            Some(bytes) => Some(String::from_utf8(bytes).map_err(|_| {
                TransportError::Protocol("paging state is not a valid token".to_string())
            })?),
            None => None,
        };

        let keys: Vec<String> = table.rows.iter().map(|r| r.key().clone()).collect();
        let (page, next) = page_keys(keys, token.as_deref(), self.faults().page_size(page_size));

        let mut items: Vec<CqlRow> = page
            .iter()
            .filter_map(|key| table.rows.get(key).map(|row| row.clone()))
            .collect();
        self.faults().arrange(&mut items);

        Ok(Page {
            items,
            continuation: next.map(String::into_bytes),
        })
    }

    async fn close(&self) {
        self.session.close();
    }
}
