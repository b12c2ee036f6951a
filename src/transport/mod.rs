// src/transport/mod.rs - Transport collaborator traits, one per backend family

use std::future::Future;
use std::time::Duration;

use crate::error::TransportError;

pub mod document;
pub mod graph;
pub mod key_value;
pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;
pub mod object_store;
pub mod queue;
pub mod table;
pub mod table_rest;
pub mod wide_column;

pub use document::DocumentClient;
pub use graph::{GraphClient, VertexUpsert};
pub use key_value::KeyValueClient;
pub use object_store::{ObjectEntry, ObjectStoreClient};
pub use queue::{QueueClient, QueueMessage, MAX_RECEIVE_BATCH};
pub use table::{TableClient, TableContinuation, TableEntity};
pub use wide_column::{CqlRow, CqlType, CqlValue, TableSchema, WideColumnClient};

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// One page of a paged enumeration. `continuation` is `None` on the last page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T, C = String> {
    pub items: Vec<T>,
    pub continuation: Option<C>,
}

impl<T, C> Page<T, C> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            continuation: None,
        }
    }

    pub fn next(items: Vec<T>, continuation: C) -> Self {
        Self {
            items,
            continuation: Some(continuation),
        }
    }

    pub fn is_last(&self) -> bool {
        self.continuation.is_none()
    }
}

/// Bound a transport call by the per-step timeout. Elapsed calls surface as
/// `Unreachable` so callers map them like any other network failure.
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> TransportResult<T>
where
    F: Future<Output = TransportResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Unreachable(format!(
            "{} timed out after {:.1}s",
            operation,
            limit.as_secs_f64()
        ))),
    }
}
