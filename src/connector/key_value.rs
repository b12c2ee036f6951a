// src/connector/key_value.rs - Redis-style hash-per-key connector

use async_trait::async_trait;
use futures::future;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::paging::paginate;
use super::session::Session;
use super::{BackendKind, ConnectionState, Connector, ConnectorOptions, RecordStream, SeedReport};
use crate::config::BackendConfig;
use crate::error::{HarnessError, Result};
use crate::record::{BackendRecord, FieldValue, SampleRecord, FIELD_CITY, FIELD_EXTERNAL_ID, FIELD_NUMERIC_ID};
use crate::transport::{with_timeout, KeyValueClient};

/// Each record is one hash at `{prefix}:{external_id}`; every field is stored as a string
pub struct KeyValueConnector {
    session: Session,
    client: Arc<dyn KeyValueClient>,
    prefix: Option<String>,
}

impl KeyValueConnector {
    pub fn new(config: BackendConfig, options: ConnectorOptions, client: Arc<dyn KeyValueClient>) -> Self {
        Self {
            session: Session::new(config, BackendKind::KeyValue, options),
            client,
            prefix: None,
        }
    }

    fn prefix(&self, operation: &'static str) -> Result<&str> {
        self.session.ensure_connected(operation)?;
        self.prefix
            .as_deref()
            .ok_or(HarnessError::NotConnected { operation })
    }
}

fn hash_fields(record: &SampleRecord) -> Vec<(String, String)> {
    vec![
        (FIELD_EXTERNAL_ID.to_string(), record.external_id().to_string()),
        (FIELD_NUMERIC_ID.to_string(), record.numeric_id().to_string()),
        (FIELD_CITY.to_string(), record.city().to_string()),
    ]
}

fn translate(external_id: &str, hash: HashMap<String, String>) -> BackendRecord {
    let mut record = BackendRecord::new(external_id);
    for name in [FIELD_NUMERIC_ID, FIELD_CITY] {
        if let Some(value) = hash.get(name) {
            record = record.with_field(name, FieldValue::Text(value.clone()));
        }
    }
    record
}

#[async_trait]
impl Connector for KeyValueConnector {
    fn name(&self) -> &str {
        self.session.name()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::KeyValue
    }

    fn state(&self) -> ConnectionState {
        self.session.state()
    }

    fn namespace(&self) -> Option<String> {
        self.prefix.as_ref().map(|prefix| format!("{}:*", prefix))
    }

    async fn connect(&mut self) -> Result<()> {
        if self.session.is_connected() {
            return Ok(());
        }
        let prefix = self
            .session
            .prepare(|config| Ok(config.require("key_prefix")?.trim_end_matches(':').to_string()))?;
        self.session.open(self.client.open()).await?;
        self.prefix = Some(prefix);
        Ok(())
    }

    /// Key-value stores have no namespace to create
    async fn ensure_namespace(&mut self) -> Result<()> {
        self.prefix("ensure_namespace")?;
        Ok(())
    }

    async fn seed(&mut self, records: &[SampleRecord]) -> Result<SeedReport> {
        let prefix = self.prefix("seed")?;
        let mut report = SeedReport::default();

        for record in records {
            let key = format!("{}:{}", prefix, record.external_id());
            let result = self
                .session
                .timed("replace hash", self.client.replace_hash(&key, hash_fields(record)))
                .await;
            report.record(record.external_id(), result);
        }

        Ok(report)
    }

    fn read_all(&self) -> RecordStream<'_> {
        let prefix = match self.prefix("read_all") {
            Ok(prefix) => format!("{}:", prefix),
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        let pattern = format!("{}*", prefix);
        let page_size = self.session.page_size();
        let timeout = self.session.step_timeout();
        let scanner = Arc::clone(&self.client);
        let reader = Arc::clone(&self.client);
        let mut seen = HashSet::new();

        paginate(move |cursor| {
            let client = scanner.clone();
            let pattern = pattern.clone();
            async move {
                with_timeout(timeout, "scan", client.scan(cursor, &pattern, page_size))
                    .await
                    .map_err(|e| HarnessError::Read(format!("scanning '{}': {}", pattern, e)))
            }
        })
        // SCAN may return a key more than once
        .try_filter(move |key| future::ready(seen.insert(key.clone())))
        .try_filter_map(move |key| {
            let client = reader.clone();
            let prefix = prefix.clone();
            async move {
                let hash = with_timeout(timeout, "get hash", client.get_hash(&key))
                    .await
                    .map_err(|e| HarnessError::Read(format!("reading '{}': {}", key, e)))?;
                let external_id = key.strip_prefix(prefix.as_str()).unwrap_or(&key);
                // expired or deleted between scan and read
                Ok(hash.map(|hash| translate(external_id, hash)))
            }
        })
        .boxed()
    }

    async fn disconnect(&mut self) {
        if self.session.begin_disconnect() {
            self.client.close().await;
        }
    }
}
