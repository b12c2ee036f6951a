// src/transport/table.rs - Azure Table / Cosmos Table API client

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Page, TransportResult};
use crate::error::TransportError;

const PARTITION_KEY: &str = "PartitionKey";
const ROW_KEY: &str = "RowKey";
/// Service-maintained properties that never round-trip as user data
const SYSTEM_PROPERTIES: &[&str] = &["Timestamp", "odata.etag", "odata.metadata"];

#[derive(Debug, Clone, PartialEq)]
pub struct TableEntity {
    pub partition_key: String,
    pub row_key: String,
    pub properties: Map<String, Value>,
}

impl TableEntity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, name: &str, value: Value) -> Self {
        self.properties.insert(name.to_string(), value);
        self
    }

    /// JSON body in the `odata=nometadata` shape
    pub fn to_json(&self) -> Value {
        let mut object = self.properties.clone();
        object.insert(PARTITION_KEY.to_string(), Value::String(self.partition_key.clone()));
        object.insert(ROW_KEY.to_string(), Value::String(self.row_key.clone()));
        Value::Object(object)
    }

    pub fn from_json(value: Value) -> Result<Self, TransportError> {
        let mut object = match value {
            Value::Object(object) => object,
            other => {
                return Err(TransportError::Protocol(format!(
                    "expected entity object, got {}",
                    other
                )))
            }
        };

        let mut take_key = |name: &str| match object.remove(name) {
            Some(Value::String(s)) => Ok(s),
            _ => Err(TransportError::Protocol(format!("entity without {}", name))),
        };
        let partition_key = take_key(PARTITION_KEY)?;
        let row_key = take_key(ROW_KEY)?;

        for system in SYSTEM_PROPERTIES {
            object.remove(*system);
        }

        Ok(Self {
            partition_key,
            row_key,
            properties: object,
        })
    }
}

/// `x-ms-continuation-NextPartitionKey` / `NextRowKey` pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TableContinuation {
    pub next_partition_key: String,
    pub next_row_key: Option<String>,
}

#[async_trait]
pub trait TableClient: Send + Sync {
    async fn open(&self) -> TransportResult<()>;

    async fn create_table(&self, table: &str) -> TransportResult<()>;

    /// Insert-or-replace
    async fn upsert_entity(&self, table: &str, entity: &TableEntity) -> TransportResult<()>;

    async fn query_entities(
        &self,
        table: &str,
        continuation: Option<TableContinuation>,
        top: usize,
    ) -> TransportResult<Page<TableEntity, TableContinuation>>;

    async fn close(&self);
}
