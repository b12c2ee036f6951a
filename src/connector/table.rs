// src/connector/table.rs - Azure Table / Cosmos Table API connector

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::paging::paginate;
use super::session::Session;
use super::{BackendKind, ConnectionState, Connector, ConnectorOptions, RecordStream, SeedReport};
use crate::config::BackendConfig;
use crate::error::{HarnessError, Result};
use crate::record::{BackendRecord, FieldValue, SampleRecord, FIELD_CITY, FIELD_NUMERIC_ID};
use crate::transport::{with_timeout, TableClient, TableEntity};

const DEFAULT_PARTITION: &str = "seed";

#[derive(Debug, Clone, PartialEq)]
struct TableLayout {
    table: String,
    partition_key: String,
}

impl TableLayout {
    fn from_config(config: &BackendConfig) -> Result<Self> {
        let table = config.require("table_name")?;
        // Table names are alphanumeric, 3 to 63 characters, not starting with a digit
        let valid = (3..=63).contains(&table.len())
            && table.chars().all(|c| c.is_ascii_alphanumeric())
            && table.chars().next().map_or(false, |c| c.is_ascii_alphabetic());
        if !valid {
            return Err(HarnessError::invalid_config(format!(
                "backend '{}' table name '{}' is not a valid table name",
                config.name, table
            )));
        }

        Ok(Self {
            table: table.to_string(),
            partition_key: config.setting_or("partition_key", DEFAULT_PARTITION).to_string(),
        })
    }

    /// PartitionKey is fixed per run, RowKey carries the external id
    fn entity_for(&self, record: &SampleRecord) -> TableEntity {
        TableEntity::new(self.partition_key.as_str(), record.external_id())
            .with_property(FIELD_NUMERIC_ID, Value::from(record.numeric_id()))
            .with_property(FIELD_CITY, Value::from(record.city()))
    }

    fn translate(&self, entity: TableEntity) -> Option<BackendRecord> {
        if entity.partition_key != self.partition_key {
            debug!(partition = %entity.partition_key, "Skipping entity from another partition");
            return None;
        }
        let mut record = BackendRecord::new(entity.row_key);
        for name in [FIELD_NUMERIC_ID, FIELD_CITY] {
            if let Some(value) = entity.properties.get(name).and_then(FieldValue::from_json) {
                record = record.with_field(name, value);
            }
        }
        Some(record)
    }
}

pub struct TableConnector {
    session: Session,
    client: Arc<dyn TableClient>,
    layout: Option<TableLayout>,
}

impl TableConnector {
    pub fn new(config: BackendConfig, options: ConnectorOptions, client: Arc<dyn TableClient>) -> Self {
        Self {
            session: Session::new(config, BackendKind::Table, options),
            client,
            layout: None,
        }
    }

    fn layout(&self, operation: &'static str) -> Result<&TableLayout> {
        self.session.ensure_connected(operation)?;
        self.layout
            .as_ref()
            .ok_or(HarnessError::NotConnected { operation })
    }
}

#[async_trait]
impl Connector for TableConnector {
    fn name(&self) -> &str {
        self.session.name()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Table
    }

    fn state(&self) -> ConnectionState {
        self.session.state()
    }

    fn namespace(&self) -> Option<String> {
        self.layout.as_ref().map(|layout| layout.table.clone())
    }

    async fn connect(&mut self) -> Result<()> {
        if self.session.is_connected() {
            return Ok(());
        }
        let layout = self.session.prepare(TableLayout::from_config)?;
        self.session.open(self.client.open()).await?;
        self.layout = Some(layout);
        Ok(())
    }

    async fn ensure_namespace(&mut self) -> Result<()> {
        let layout = self.layout("ensure_namespace")?;
        self.session
            .create_if_missing(&layout.table, self.client.create_table(&layout.table))
            .await
    }

    async fn seed(&mut self, records: &[SampleRecord]) -> Result<SeedReport> {
        let layout = self.layout("seed")?;
        let mut report = SeedReport::default();

        for record in records {
            let entity = layout.entity_for(record);
            let result = self
                .session
                .timed("upsert entity", self.client.upsert_entity(&layout.table, &entity))
                .await;
            report.record(record.external_id(), result);
        }

        Ok(report)
    }

    fn read_all(&self) -> RecordStream<'_> {
        let layout = match self.layout("read_all") {
            Ok(layout) => layout.clone(),
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        let table = layout.table.clone();
        let client = Arc::clone(&self.client);
        let page_size = self.session.page_size();
        let timeout = self.session.step_timeout();

        paginate(move |continuation| {
            let client = client.clone();
            let table = table.clone();
            async move {
                with_timeout(timeout, "query entities", client.query_entities(&table, continuation, page_size))
                    .await
                    .map_err(|e| HarnessError::Read(format!("querying '{}': {}", table, e)))
            }
        })
        .try_filter_map(move |entity| futures::future::ok(layout.translate(entity)))
        .boxed()
    }

    async fn disconnect(&mut self) {
        if self.session.begin_disconnect() {
            self.client.close().await;
        }
    }
}
