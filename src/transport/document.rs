// src/transport/document.rs - Document database client (Cosmos Core SQL, MongoDB)

use async_trait::async_trait;

use super::{Page, TransportResult};

#[async_trait]
pub trait DocumentClient: Send + Sync {
    async fn open(&self) -> TransportResult<()>;

    async fn create_database(&self, database: &str) -> TransportResult<()>;

    /// Create a container/collection. `partition_key` is the partition key
    /// path for stores that need one (e.g. `/id`).
    async fn create_container(
        &self,
        database: &str,
        container: &str,
        partition_key: Option<&str>,
    ) -> TransportResult<()>;

    /// Insert or replace the document identified by `id`
    async fn upsert_document(
        &self,
        database: &str,
        container: &str,
        id: &str,
        document: serde_json::Value,
    ) -> TransportResult<()>;

    async fn query_documents(
        &self,
        database: &str,
        container: &str,
        continuation: Option<String>,
        max_items: usize,
    ) -> TransportResult<Page<serde_json::Value>>;

    async fn close(&self);
}
