// src/connector/wide_column.rs - Cassandra-style keyspace/table connector

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::debug;

use super::paging::paginate;
use super::session::Session;
use super::{BackendKind, ConnectionState, Connector, ConnectorOptions, RecordStream, SeedReport};
use crate::config::BackendConfig;
use crate::error::{HarnessError, Result, TransportError};
use crate::record::{BackendRecord, FieldValue, SampleRecord, FIELD_CITY, FIELD_NUMERIC_ID};
use crate::transport::{with_timeout, CqlRow, CqlType, CqlValue, TableSchema, WideColumnClient};

const COLUMN_EXTERNAL_ID: &str = "external_id";
const COLUMN_NUMERIC_ID: &str = "numeric_id";
const COLUMN_CITY: &str = "city";
const DEFAULT_REPLICATION_FACTOR: u32 = 1;

fn schema_for(config: &BackendConfig) -> Result<(TableSchema, u32)> {
    // port is only used by live sessions but must still be a valid number
    config.parse_setting::<u16>("port")?;

    let replication_factor = config
        .parse_setting::<u32>("replication_factor")?
        .unwrap_or(DEFAULT_REPLICATION_FACTOR);
    if replication_factor == 0 {
        return Err(HarnessError::invalid_config(format!(
            "backend '{}' setting 'replication_factor' must be at least 1",
            config.name
        )));
    }

    let schema = TableSchema {
        keyspace: config.require("keyspace")?.to_string(),
        table: config.require("table_name")?.to_string(),
        primary_key: COLUMN_EXTERNAL_ID.to_string(),
        columns: vec![
            (COLUMN_EXTERNAL_ID.to_string(), CqlType::Text),
            (COLUMN_NUMERIC_ID.to_string(), CqlType::Int),
            (COLUMN_CITY.to_string(), CqlType::Text),
        ],
    };
    Ok((schema, replication_factor))
}

fn row_for(record: &SampleRecord) -> std::result::Result<CqlRow, TransportError> {
    let numeric_id = i32::try_from(record.numeric_id()).map_err(|_| {
        TransportError::Rejected(format!(
            "numericId {} does not fit an int column",
            record.numeric_id()
        ))
    })?;

    let mut row = CqlRow::new();
    row.insert(
        COLUMN_EXTERNAL_ID.to_string(),
        CqlValue::Text(record.external_id().to_string()),
    );
    row.insert(COLUMN_NUMERIC_ID.to_string(), CqlValue::Int(numeric_id));
    row.insert(COLUMN_CITY.to_string(), CqlValue::Text(record.city().to_string()));
    Ok(row)
}

fn field_value(value: &CqlValue) -> Option<FieldValue> {
    match value {
        CqlValue::Text(s) => Some(FieldValue::Text(s.clone())),
        CqlValue::Int(i) => Some(FieldValue::Integer(i64::from(*i))),
        CqlValue::BigInt(i) => Some(FieldValue::Integer(*i)),
        CqlValue::Null => None,
    }
}

fn translate(row: CqlRow) -> Option<BackendRecord> {
    let external_id = match row.get(COLUMN_EXTERNAL_ID) {
        Some(CqlValue::Text(id)) => id.clone(),
        _ => {
            debug!("Skipping row without a text primary key");
            return None;
        }
    };

    let mut record = BackendRecord::new(external_id);
    for (column, canonical) in [(COLUMN_NUMERIC_ID, FIELD_NUMERIC_ID), (COLUMN_CITY, FIELD_CITY)] {
        if let Some(value) = row.get(column).and_then(field_value) {
            record = record.with_field(canonical, value);
        }
    }
    Some(record)
}

pub struct WideColumnConnector {
    session: Session,
    client: Arc<dyn WideColumnClient>,
    schema: Option<TableSchema>,
    replication_factor: u32,
}

impl WideColumnConnector {
    pub fn new(
        config: BackendConfig,
        options: ConnectorOptions,
        client: Arc<dyn WideColumnClient>,
    ) -> Self {
        Self {
            session: Session::new(config, BackendKind::Cassandra, options),
            client,
            schema: None,
            replication_factor: DEFAULT_REPLICATION_FACTOR,
        }
    }

    fn schema(&self, operation: &'static str) -> Result<&TableSchema> {
        self.session.ensure_connected(operation)?;
        self.schema
            .as_ref()
            .ok_or(HarnessError::NotConnected { operation })
    }
}

#[async_trait]
impl Connector for WideColumnConnector {
    fn name(&self) -> &str {
        self.session.name()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Cassandra
    }

    fn state(&self) -> ConnectionState {
        self.session.state()
    }

    fn namespace(&self) -> Option<String> {
        self.schema.as_ref().map(TableSchema::qualified_name)
    }

    async fn connect(&mut self) -> Result<()> {
        if self.session.is_connected() {
            return Ok(());
        }
        let (schema, replication_factor) = self.session.prepare(schema_for)?;
        self.session.open(self.client.open()).await?;
        self.schema = Some(schema);
        self.replication_factor = replication_factor;
        Ok(())
    }

    async fn ensure_namespace(&mut self) -> Result<()> {
        let schema = self.schema("ensure_namespace")?;
        self.session
            .create_if_missing(
                &schema.keyspace,
                self.client
                    .create_keyspace(&schema.keyspace, self.replication_factor),
            )
            .await?;
        self.session
            .create_if_missing(&schema.qualified_name(), self.client.create_table(schema))
            .await
    }

    async fn seed(&mut self, records: &[SampleRecord]) -> Result<SeedReport> {
        let schema = self.schema("seed")?;
        let mut report = SeedReport::default();

        for record in records {
            let result = match row_for(record) {
                Ok(row) => {
                    self.session
                        .timed("insert row", self.client.insert_row(schema, row))
                        .await
                }
                Err(e) => Err(e),
            };
            report.record(record.external_id(), result);
        }

        Ok(report)
    }

    fn read_all(&self) -> RecordStream<'_> {
        let schema = match self.schema("read_all") {
            Ok(schema) => schema.clone(),
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        let client = Arc::clone(&self.client);
        let page_size = self.session.page_size();
        let timeout = self.session.step_timeout();

        paginate(move |paging_state| {
            let client = client.clone();
            let schema = schema.clone();
            async move {
                with_timeout(timeout, "select page", client.select_page(&schema, paging_state, page_size))
                    .await
                    .map_err(|e| {
                        HarnessError::Read(format!("selecting from '{}': {}", schema.qualified_name(), e))
                    })
            }
        })
        .try_filter_map(|row| futures::future::ok(translate(row)))
        .boxed()
    }

    async fn disconnect(&mut self) {
        if self.session.begin_disconnect() {
            self.client.close().await;
        }
    }
}
