// src/connector/document.rs - Document database connector (Cosmos Core SQL and MongoDB)

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
use crate::record::{BackendRecord, SampleRecord, CANONICAL_FIELDS};
use crate::transport::{with_timeout, DocumentClient};

/// Database, container and id conventions for one document store flavor
#[derive(Debug, Clone, PartialEq)]
struct DocumentLayout {
    database: String,
    container: String,
    id_field: String,
    partition_key: Option<String>,
}

impl DocumentLayout {
    fn from_config(kind: BackendKind, config: &BackendConfig) -> Result<Self> {
        let database = config.require("database_name")?.to_string();
        let (container, default_id, partition_key) = match kind {
            BackendKind::Mongo => (config.require("collection_name")?, "_id", None),
            _ => (
                config.require("container_name")?,
                "id",
                Some(config.setting_or("partition_key", "/id").to_string()),
            ),
        };

        Ok(Self {
            database,
            container: container.to_string(),
            id_field: config.setting_or("id_field", default_id).to_string(),
            partition_key,
        })
    }

    fn document_for(&self, record: &SampleRecord) -> Value {
        let mut document = record.to_canonical_json();
        if let Value::Object(object) = &mut document {
            object.insert(
                self.id_field.clone(),
                Value::String(record.external_id().to_string()),
            );
        }
        document
    }

    /// Documents without the id field were not written by the harness
    fn translate(&self, document: Value) -> Option<BackendRecord> {
        let object = match document {
            Value::Object(object) => object,
            _ => return None,
        };
        let record = BackendRecord::from_json_object(&object, &self.id_field, CANONICAL_FIELDS);
        if record.is_none() {
            debug!(id_field = %self.id_field, "Skipping foreign document");
        }
        record
    }

    fn namespace(&self) -> String {
        format!("{}/{}", self.database, self.container)
    }
}

pub struct DocumentConnector {
    session: Session,
    client: Arc<dyn DocumentClient>,
    layout: Option<DocumentLayout>,
}

impl DocumentConnector {
    pub fn new(
        config: BackendConfig,
        kind: BackendKind,
        options: ConnectorOptions,
        client: Arc<dyn DocumentClient>,
    ) -> Result<Self> {
        if !matches!(kind, BackendKind::CosmosSql | BackendKind::Mongo) {
            return Err(HarnessError::Config(format!(
                "document connector cannot serve '{}' backends",
                kind
            )));
        }
        Ok(Self {
            session: Session::new(config, kind, options),
            client,
            layout: None,
        })
    }

    fn layout(&self, operation: &'static str) -> Result<&DocumentLayout> {
        self.session.ensure_connected(operation)?;
        self.layout
            .as_ref()
            .ok_or(HarnessError::NotConnected { operation })
    }
}

#[async_trait]
impl Connector for DocumentConnector {
    fn name(&self) -> &str {
        self.session.name()
    }

    fn kind(&self) -> BackendKind {
        self.session.kind()
    }

    fn state(&self) -> ConnectionState {
        self.session.state()
    }

    fn namespace(&self) -> Option<String> {
        self.layout.as_ref().map(DocumentLayout::namespace)
    }

    async fn connect(&mut self) -> Result<()> {
        if self.session.is_connected() {
            return Ok(());
        }
        let kind = self.session.kind();
        let layout = self
            .session
            .prepare(|config| DocumentLayout::from_config(kind, config))?;
        self.session.open(self.client.open()).await?;
        self.layout = Some(layout);
        Ok(())
    }

    async fn ensure_namespace(&mut self) -> Result<()> {
        let layout = self.layout("ensure_namespace")?;
        self.session
            .create_if_missing(&layout.database, self.client.create_database(&layout.database))
            .await?;
        self.session
            .create_if_missing(
                &layout.namespace(),
                self.client.create_container(
                    &layout.database,
                    &layout.container,
                    layout.partition_key.as_deref(),
                ),
            )
            .await
    }

    async fn seed(&mut self, records: &[SampleRecord]) -> Result<SeedReport> {
        let layout = self.layout("seed")?;
        let mut report = SeedReport::default();

        for record in records {
            let result = self
                .session
                .timed(
                    "upsert document",
                    self.client.upsert_document(
                        &layout.database,
                        &layout.container,
                        record.external_id(),
                        layout.document_for(record),
                    ),
                )
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
        let client = Arc::clone(&self.client);
        let page_size = self.session.page_size();
        let timeout = self.session.step_timeout();
        let translator = layout.clone();

        paginate(move |continuation| {
            let client = client.clone();
            let layout = layout.clone();
            async move {
                with_timeout(
                    timeout,
                    "query documents",
                    client.query_documents(&layout.database, &layout.container, continuation, page_size),
                )
                .await
                .map_err(|e| HarnessError::Read(format!("querying '{}': {}", layout.namespace(), e)))
            }
        })
        .try_filter_map(move |document| futures::future::ok(translator.translate(document)))
        .boxed()
    }

    async fn disconnect(&mut self) {
        if self.session.begin_disconnect() {
            self.client.close().await;
        }
    }
}
