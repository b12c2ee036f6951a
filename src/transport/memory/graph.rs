// src/transport/memory/graph.rs - Simulated property graph

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{page_keys, FaultPlan, SimulatedSession};
use crate::error::TransportError;
use crate::transport::{GraphClient, Page, TransportResult, VertexUpsert};

#[derive(Debug, Clone)]
struct Vertex {
    label: String,
    /// Property name to list of values (Gremlin multi-properties)
    properties: BTreeMap<String, Vec<Value>>,
}

#[derive(Clone, Default)]
pub struct MemoryGraphStore {
    session: SimulatedSession,
    graphs: Arc<DashMap<String, Arc<DashMap<String, Vertex>>>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Arc<FaultPlan>) -> Self {
        Self {
            session: SimulatedSession::new(faults),
            graphs: Arc::new(DashMap::new()),
        }
    }

    pub fn faults(&self) -> &Arc<FaultPlan> {
        self.session.faults()
    }

    pub fn vertex_count(&self, graph: &str) -> usize {
        self.graphs.get(graph).map(|g| g.len()).unwrap_or(0)
    }

    pub fn drop_vertex(&self, graph: &str, id: &str) -> bool {
        self.graphs
            .get(graph)
            .and_then(|g| g.remove(id))
            .is_some()
    }

    fn graph(&self, graph: &str) -> TransportResult<Arc<DashMap<String, Vertex>>> {
        self.graphs
            .get(graph)
            .map(|g| g.value().clone())
            .ok_or_else(|| TransportError::NotFound(format!("graph '{}'", graph)))
    }
}

#[async_trait]
impl GraphClient for MemoryGraphStore {
    async fn open(&self) -> TransportResult<()> {
        self.session.open()
    }

    async fn create_graph(
        &self,
        database: &str,
        graph: &str,
        partition_key: &str,
    ) -> TransportResult<()> {
        self.session.ensure_open()?;
        self.faults().check_namespace(graph)?;
        match self.graphs.entry(graph.to_string()) {
            Entry::Occupied(_) => Err(TransportError::AlreadyExists(format!("graph '{}'", graph))),
            Entry::Vacant(entry) => {
                debug!(
                    "Created simulated graph {}/{} (partition key {})",
                    database, graph, partition_key
                );
                entry.insert(Arc::new(DashMap::new()));
                Ok(())
            }
        }
    }

    async fn upsert_vertex(&self, graph: &str, vertex: &VertexUpsert) -> TransportResult<()> {
        self.session.ensure_open()?;
        self.faults().check_write(&vertex.id)?;
        let vertices = self.graph(graph)?;
        debug!("{}", vertex.to_traversal());

        let mut stored = vertices.entry(vertex.id.clone()).or_insert_with(|| Vertex {
            label: vertex.label.clone(),
            properties: BTreeMap::new(),
        });
        for (name, value) in &vertex.properties {
            // single cardinality replaces any previous values
            stored.properties.insert(name.clone(), vec![value.clone()]);
        }
        Ok(())
    }

    async fn vertex_value_maps(
        &self,
        graph: &str,
        label: &str,
        continuation: Option<String>,
        page_size: usize,
    ) -> TransportResult<Page<Value>> {
        self.session.ensure_open()?;
        let vertices = self.graph(graph)?;
        self.faults().begin_page(continuation.is_none())?;

        let ids: Vec<String> = vertices
            .iter()
            .filter(|v| v.label == label)
            .map(|v| v.key().clone())
            .collect();
        let (page, next) = page_keys(ids, continuation.as_deref(), self.faults().page_size(page_size));

        let mut items: Vec<Value> = page
            .iter()
            .filter_map(|id| {
                vertices.get(id).map(|vertex| {
                    let mut map = Map::new();
                    map.insert("id".to_string(), Value::String(id.clone()));
                    map.insert("label".to_string(), Value::String(vertex.label.clone()));
                    for (name, values) in &vertex.properties {
                        map.insert(name.clone(), Value::Array(values.clone()));
                    }
                    Value::Object(map)
                })
            })
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
