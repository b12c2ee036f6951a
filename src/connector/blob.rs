// src/connector/blob.rs - Blob container and Data Lake filesystem connector

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::paging::paginate;
use super::session::Session;
use super::{BackendKind, ConnectionState, Connector, ConnectorOptions, RecordStream, SeedReport};
use crate::config::BackendConfig;
use crate::error::{HarnessError, Result, TransportError};
use crate::record::{BackendRecord, SampleRecord, CANONICAL_FIELDS, FIELD_EXTERNAL_ID};
use crate::transport::{with_timeout, ObjectStoreClient, Page};

const DEFAULT_BLOB_PREFIX: &str = "samples/";

/// Where records live inside the object store
#[derive(Debug, Clone, PartialEq)]
struct ObjectLayout {
    container: String,
    directory: Option<String>,
    prefix: String,
}

impl ObjectLayout {
    fn from_config(kind: BackendKind, config: &BackendConfig) -> Result<Self> {
        match kind {
            BackendKind::DataLake => {
                let directory = config.require("directory_name")?.trim_matches('/').to_string();
                Ok(Self {
                    container: config.require("filesystem_name")?.to_string(),
                    prefix: format!("{}/", directory),
                    directory: Some(directory),
                })
            }
            _ => {
                let mut prefix = config.setting_or("blob_prefix", DEFAULT_BLOB_PREFIX).to_string();
                if !prefix.is_empty() && !prefix.ends_with('/') {
                    prefix.push('/');
                }
                Ok(Self {
                    container: config.require("container_name")?.to_string(),
                    directory: None,
                    prefix,
                })
            }
        }
    }

    fn path_for(&self, external_id: &str) -> String {
        format!("{}{}.json", self.prefix, external_id)
    }

    fn id_from_path(&self, path: &str) -> Option<String> {
        path.strip_prefix(&self.prefix)?
            .strip_suffix(".json")
            .filter(|id| !id.is_empty() && !id.contains('/'))
            .map(str::to_string)
    }

    fn namespace(&self) -> String {
        match &self.directory {
            Some(directory) => format!("{}/{}", self.container, directory),
            None => self.container.clone(),
        }
    }
}

/// The object path is authoritative for the id; the body supplies fields
fn decode(external_id: String, body: &[u8]) -> BackendRecord {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => {
            let mut record =
                BackendRecord::from_json_object(&object, FIELD_EXTERNAL_ID, CANONICAL_FIELDS)
                    .unwrap_or_else(|| BackendRecord::new(external_id.clone()));
            record.external_id = external_id;
            record
        }
        _ => {
            warn!(record_id = %external_id, "Object body is not a JSON object");
            BackendRecord::new(external_id)
        }
    }
}

pub struct ObjectConnector {
    session: Session,
    client: Arc<dyn ObjectStoreClient>,
    layout: Option<ObjectLayout>,
}

impl ObjectConnector {
    pub fn new(
        config: BackendConfig,
        kind: BackendKind,
        options: ConnectorOptions,
        client: Arc<dyn ObjectStoreClient>,
    ) -> Result<Self> {
        if !matches!(kind, BackendKind::Blob | BackendKind::DataLake) {
            return Err(HarnessError::Config(format!(
                "object connector cannot serve '{}' backends",
                kind
            )));
        }
        Ok(Self {
            session: Session::new(config, kind, options),
            client,
            layout: None,
        })
    }

    fn layout(&self, operation: &'static str) -> Result<&ObjectLayout> {
        self.session.ensure_connected(operation)?;
        self.layout
            .as_ref()
            .ok_or(HarnessError::NotConnected { operation })
    }
}

async fn fetch_page(
    client: Arc<dyn ObjectStoreClient>,
    layout: ObjectLayout,
    marker: Option<String>,
    page_size: usize,
    timeout: Duration,
) -> Result<Page<BackendRecord>> {
    let page = with_timeout(
        timeout,
        "list objects",
        client.list_objects(&layout.container, &layout.prefix, marker, page_size),
    )
    .await
    .map_err(|e| HarnessError::Read(format!("listing '{}': {}", layout.namespace(), e)))?;

    let mut records = Vec::with_capacity(page.items.len());
    for entry in page.items {
        let Some(external_id) = layout.id_from_path(&entry.path) else {
            debug!(path = %entry.path, "Ignoring object outside the record layout");
            continue;
        };
        match with_timeout(timeout, "get object", client.get_object(&layout.container, &entry.path)).await {
            Ok(body) => records.push(decode(external_id, &body)),
            Err(TransportError::NotFound(_)) => {
                debug!(path = %entry.path, "Object deleted between listing and download");
            }
            Err(e) => {
                return Err(HarnessError::Read(format!(
                    "downloading '{}': {}",
                    entry.path, e
                )))
            }
        }
    }

    Ok(Page {
        items: records,
        continuation: page.continuation,
    })
}

#[async_trait]
impl Connector for ObjectConnector {
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
        self.layout.as_ref().map(ObjectLayout::namespace)
    }

    async fn connect(&mut self) -> Result<()> {
        if self.session.is_connected() {
            return Ok(());
        }
        let kind = self.session.kind();
        let layout = self
            .session
            .prepare(|config| ObjectLayout::from_config(kind, config))?;
        self.session.open(self.client.open()).await?;
        self.layout = Some(layout);
        Ok(())
    }

    async fn ensure_namespace(&mut self) -> Result<()> {
        let layout = self.layout("ensure_namespace")?;
        self.session
            .create_if_missing(&layout.container, self.client.create_container(&layout.container))
            .await?;
        if let Some(directory) = &layout.directory {
            self.session
                .create_if_missing(
                    &layout.namespace(),
                    self.client.create_directory(&layout.container, directory),
                )
                .await?;
        }
        Ok(())
    }

    async fn seed(&mut self, records: &[SampleRecord]) -> Result<SeedReport> {
        let layout = self.layout("seed")?;
        let mut report = SeedReport::default();

        for record in records {
            let path = layout.path_for(record.external_id());
            let body = serde_json::to_vec(&record.to_canonical_json())?;
            let result = self
                .session
                .timed("put object", self.client.put_object(&layout.container, &path, body))
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

        paginate(move |marker| {
            fetch_page(client.clone(), layout.clone(), marker, page_size, timeout)
        })
    }

    async fn disconnect(&mut self) {
        if self.session.begin_disconnect() {
            self.client.close().await;
        }
    }
}
