// src/connector/graph.rs - Gremlin graph connector

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use std::sync::Arc;

use super::paging::paginate;
use super::session::Session;
use super::{BackendKind, ConnectionState, Connector, ConnectorOptions, RecordStream, SeedReport};
use crate::config::BackendConfig;
use crate::error::{HarnessError, Result};
use crate::record::{BackendRecord, SampleRecord, CANONICAL_FIELDS, FIELD_CITY, FIELD_NUMERIC_ID};
use crate::transport::{with_timeout, GraphClient, VertexUpsert};

const VERTEX_LABEL: &str = "person";

#[derive(Debug, Clone, PartialEq)]
struct GraphLayout {
    database: String,
    graph: String,
    partition_key: String,
}

impl GraphLayout {
    fn from_config(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            database: config.require("database_name")?.to_string(),
            graph: config.require("graph_name")?.to_string(),
            partition_key: config.setting_or("partition_key", "/id").to_string(),
        })
    }
}

/// Records are vertices labelled `person` with the external id as vertex id
fn vertex_for(record: &SampleRecord) -> VertexUpsert {
    VertexUpsert {
        label: VERTEX_LABEL.to_string(),
        id: record.external_id().to_string(),
        properties: vec![
            (FIELD_NUMERIC_ID.to_string(), Value::from(record.numeric_id())),
            (FIELD_CITY.to_string(), Value::from(record.city())),
        ],
    }
}

fn translate(value_map: Value) -> Option<BackendRecord> {
    match value_map {
        Value::Object(object) => BackendRecord::from_json_object(&object, "id", CANONICAL_FIELDS),
        _ => None,
    }
}

pub struct GraphConnector {
    session: Session,
    client: Arc<dyn GraphClient>,
    layout: Option<GraphLayout>,
}

impl GraphConnector {
    pub fn new(config: BackendConfig, options: ConnectorOptions, client: Arc<dyn GraphClient>) -> Self {
        Self {
            session: Session::new(config, BackendKind::Gremlin, options),
            client,
            layout: None,
        }
    }

    fn layout(&self, operation: &'static str) -> Result<&GraphLayout> {
        self.session.ensure_connected(operation)?;
        self.layout
            .as_ref()
            .ok_or(HarnessError::NotConnected { operation })
    }
}

#[async_trait]
impl Connector for GraphConnector {
    fn name(&self) -> &str {
        self.session.name()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Gremlin
    }

    fn state(&self) -> ConnectionState {
        self.session.state()
    }

    fn namespace(&self) -> Option<String> {
        self.layout
            .as_ref()
            .map(|layout| format!("{}/{}", layout.database, layout.graph))
    }

    async fn connect(&mut self) -> Result<()> {
        if self.session.is_connected() {
            return Ok(());
        }
        let layout = self.session.prepare(GraphLayout::from_config)?;
        self.session.open(self.client.open()).await?;
        self.layout = Some(layout);
        Ok(())
    }

    async fn ensure_namespace(&mut self) -> Result<()> {
        let layout = self.layout("ensure_namespace")?;
        self.session
            .create_if_missing(
                &layout.graph,
                self.client
                    .create_graph(&layout.database, &layout.graph, &layout.partition_key),
            )
            .await
    }

    async fn seed(&mut self, records: &[SampleRecord]) -> Result<SeedReport> {
        let layout = self.layout("seed")?;
        let mut report = SeedReport::default();

        for record in records {
            let vertex = vertex_for(record);
            let result = self
                .session
                .timed("upsert vertex", self.client.upsert_vertex(&layout.graph, &vertex))
                .await;
            report.record(record.external_id(), result);
        }

        Ok(report)
    }

    fn read_all(&self) -> RecordStream<'_> {
        let graph = match self.layout("read_all") {
            Ok(layout) => layout.graph.clone(),
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        let client = Arc::clone(&self.client);
        let page_size = self.session.page_size();
        let timeout = self.session.step_timeout();

        paginate(move |continuation| {
            let client = client.clone();
            let graph = graph.clone();
            async move {
                with_timeout(
                    timeout,
                    "value maps",
                    client.vertex_value_maps(&graph, VERTEX_LABEL, continuation, page_size),
                )
                .await
                .map_err(|e| HarnessError::Read(format!("traversing '{}': {}", graph, e)))
            }
        })
        .try_filter_map(|value_map| futures::future::ok(translate(value_map)))
        .boxed()
    }

    async fn disconnect(&mut self) {
        if self.session.begin_disconnect() {
            self.client.close().await;
        }
    }
}
