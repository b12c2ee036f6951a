// src/transport/queue.rs - Storage queue client

use async_trait::async_trait;
use std::time::Duration;

use super::TransportResult;

/// Most messages a single receive call may return
pub const MAX_RECEIVE_BATCH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub pop_receipt: String,
    pub text: String,
    pub dequeue_count: u32,
}

/// Receiving hides messages for `visibility_timeout`; release makes a
/// received message visible again without deleting it.
#[async_trait]
pub trait QueueClient: Send + Sync {
    async fn open(&self) -> TransportResult<()>;

    async fn create_queue(&self, queue: &str) -> TransportResult<()>;

    async fn send_message(&self, queue: &str, text: &str) -> TransportResult<()>;

    async fn receive_messages(
        &self,
        queue: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> TransportResult<Vec<QueueMessage>>;

    async fn release_message(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
    ) -> TransportResult<()>;

    async fn close(&self);
}
