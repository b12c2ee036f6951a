// src/transport/object_store.rs - Blob container / data lake filesystem client

use async_trait::async_trait;

use super::{Page, TransportResult};

/// Listing entry for a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub path: String,
    pub size: u64,
}

/// Flat or hierarchical object store. Containers double as data lake
/// filesystems; directories only exist for hierarchical namespaces.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn open(&self) -> TransportResult<()>;

    /// `AlreadyExists` is a valid answer and callers treat it as success
    async fn create_container(&self, container: &str) -> TransportResult<()>;

    async fn create_directory(&self, container: &str, directory: &str) -> TransportResult<()>;

    /// Upload with overwrite
    async fn put_object(&self, container: &str, path: &str, body: Vec<u8>) -> TransportResult<()>;

    async fn get_object(&self, container: &str, path: &str) -> TransportResult<Vec<u8>>;

    /// List objects whose path starts with `prefix`, resuming from `marker`
    async fn list_objects(
        &self,
        container: &str,
        prefix: &str,
        marker: Option<String>,
        max_results: usize,
    ) -> TransportResult<Page<ObjectEntry>>;

    async fn close(&self);
}
