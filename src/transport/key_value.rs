// src/transport/key_value.rs - Redis-style key-value client

use async_trait::async_trait;
use std::collections::HashMap;

use super::{Page, TransportResult};

/// Hash-per-key store with cursor based scanning. A cursor of `None` in a
/// returned page means the scan is complete. Scans may return a key more
/// than once; callers deduplicate.
#[async_trait]
pub trait KeyValueClient: Send + Sync {
    async fn open(&self) -> TransportResult<()>;

    /// Replace the whole hash stored at `key`
    async fn replace_hash(&self, key: &str, fields: Vec<(String, String)>) -> TransportResult<()>;

    async fn get_hash(&self, key: &str) -> TransportResult<Option<HashMap<String, String>>>;

    /// SCAN-style iteration over keys matching a glob `pattern`
    async fn scan(
        &self,
        cursor: Option<u64>,
        pattern: &str,
        count: usize,
    ) -> TransportResult<Page<String, u64>>;

    async fn close(&self);
}
