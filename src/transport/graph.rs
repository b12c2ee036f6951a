// src/transport/graph.rs - Gremlin graph client and upsert traversal rendering

use async_trait::async_trait;
use serde_json::Value;

use super::{Page, TransportResult};

/// Create-or-update of a single vertex keyed by id
#[derive(Debug, Clone, PartialEq)]
pub struct VertexUpsert {
    pub label: String,
    pub id: String,
    pub properties: Vec<(String, Value)>,
}

impl VertexUpsert {
    /// Gremlin traversal that reuses an existing vertex or adds one, then
    /// overwrites every property with single cardinality
    pub fn to_traversal(&self) -> String {
        let mut traversal = format!(
            "g.V({id}).fold().coalesce(unfold(), addV({label}).property('id', {id}))",
            id = gremlin_literal(&Value::String(self.id.clone())),
            label = gremlin_literal(&Value::String(self.label.clone())),
        );
        for (name, value) in &self.properties {
            traversal.push_str(&format!(
                ".property(single, {}, {})",
                gremlin_literal(&Value::String(name.clone())),
                gremlin_literal(value)
            ));
        }
        traversal
    }
}

fn gremlin_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
pub trait GraphClient: Send + Sync {
    async fn open(&self) -> TransportResult<()>;

    async fn create_graph(
        &self,
        database: &str,
        graph: &str,
        partition_key: &str,
    ) -> TransportResult<()>;

    async fn upsert_vertex(&self, graph: &str, vertex: &VertexUpsert) -> TransportResult<()>;

    /// `g.V().hasLabel(label).valueMap(true)` one page at a time. Each item is
    /// an object with `id`, `label` and list-valued properties.
    async fn vertex_value_maps(
        &self,
        graph: &str,
        label: &str,
        continuation: Option<String>,
        page_size: usize,
    ) -> TransportResult<Page<Value>>;

    async fn close(&self);
}
