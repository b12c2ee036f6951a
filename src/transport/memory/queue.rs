// src/transport/memory/queue.rs - Simulated storage queue with visibility timeouts

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::{FaultPlan, SimulatedSession};
use crate::error::TransportError;
use crate::transport::{QueueClient, QueueMessage, TransportResult, MAX_RECEIVE_BATCH};

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    text: String,
    pop_receipt: Option<String>,
    visible_at: Instant,
    dequeue_count: u32,
}

#[derive(Default)]
struct StoredQueue {
    sequence: AtomicU64,
    messages: DashMap<u64, StoredMessage>,
}

#[derive(Clone, Default)]
pub struct MemoryQueueStore {
    session: SimulatedSession,
    queues: Arc<DashMap<String, Arc<StoredQueue>>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Arc<FaultPlan>) -> Self {
        Self {
            session: SimulatedSession::new(faults),
            queues: Arc::new(DashMap::new()),
        }
    }

    pub fn faults(&self) -> &Arc<FaultPlan> {
        self.session.faults()
    }

    pub fn message_count(&self, queue: &str) -> usize {
        self.queues.get(queue).map(|q| q.messages.len()).unwrap_or(0)
    }

    pub fn visible_count(&self, queue: &str) -> usize {
        let now = Instant::now();
        self.queues
            .get(queue)
            .map(|q| q.messages.iter().filter(|m| m.visible_at <= now).count())
            .unwrap_or(0)
    }

    /// Drop every message whose body mentions `needle`
    pub fn purge_matching(&self, queue: &str, needle: &str) -> usize {
        match self.queues.get(queue) {
            Some(q) => {
                let before = q.messages.len();
                q.messages.retain(|_, m| !m.text.contains(needle));
                before - q.messages.len()
            }
            None => 0,
        }
    }

    fn queue(&self, queue: &str) -> TransportResult<Arc<StoredQueue>> {
        self.queues
            .get(queue)
            .map(|q| q.value().clone())
            .ok_or_else(|| TransportError::NotFound(format!("queue '{}'", queue)))
    }
}

#[async_trait]
impl QueueClient for MemoryQueueStore {
    async fn open(&self) -> TransportResult<()> {
        self.session.open()
    }

    async fn create_queue(&self, queue: &str) -> TransportResult<()> {
        self.session.ensure_open()?;
        self.faults().check_namespace(queue)?;
        match self.queues.entry(queue.to_string()) {
            Entry::Occupied(_) => Err(TransportError::AlreadyExists(format!("queue '{}'", queue))),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(StoredQueue::default()));
                Ok(())
            }
        }
    }

    async fn send_message(&self, queue: &str, text: &str) -> TransportResult<()> {
        self.session.ensure_open()?;
        self.faults().check_write(text)?;
        let stored = self.queue(queue)?;
        let sequence = stored.sequence.fetch_add(1, Ordering::SeqCst);
        stored.messages.insert(
            sequence,
            StoredMessage {
                message_id: Uuid::new_v4().to_string(),
                text: text.to_string(),
                pop_receipt: None,
                visible_at: Instant::now(),
                dequeue_count: 0,
            },
        );
        Ok(())
    }

    async fn receive_messages(
        &self,
        queue: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> TransportResult<Vec<QueueMessage>> {
        self.session.ensure_open()?;
        if max_messages == 0 || max_messages > MAX_RECEIVE_BATCH {
            return Err(TransportError::Rejected(format!(
                "max_messages must be between 1 and {}",
                MAX_RECEIVE_BATCH
            )));
        }
        let stored = self.queue(queue)?;
        let now = Instant::now();

        // A receive with nothing in flight starts a fresh enumeration
        let in_flight = stored.messages.iter().any(|m| m.visible_at > now);
        self.faults().begin_page(!in_flight)?;

        let mut candidates: Vec<u64> = stored
            .messages
            .iter()
            .filter(|m| m.visible_at <= now)
            .map(|m| *m.key())
            .collect();
        candidates.sort_unstable();

        let limit = self.faults().page_size(max_messages);
        let mut received = Vec::new();
        for sequence in candidates {
            if received.len() == limit {
                break;
            }
            if let Some(mut message) = stored.messages.get_mut(&sequence) {
                // another receiver may have taken it since the scan
                if message.visible_at > now {
                    continue;
                }
                let receipt = Uuid::new_v4().to_string();
                message.pop_receipt = Some(receipt.clone());
                message.visible_at = now + visibility_timeout;
                message.dequeue_count += 1;
                received.push(QueueMessage {
                    message_id: message.message_id.clone(),
                    pop_receipt: receipt,
                    text: message.text.clone(),
                    dequeue_count: message.dequeue_count,
                });
            }
        }
        self.faults().arrange(&mut received);
        Ok(received)
    }

    async fn release_message(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
    ) -> TransportResult<()> {
        self.session.ensure_open()?;
        let stored = self.queue(queue)?;
        for mut message in stored.messages.iter_mut() {
            if message.message_id == message_id {
                if message.pop_receipt.as_deref() != Some(pop_receipt) {
                    return Err(TransportError::NotFound(format!(
                        "pop receipt for message '{}' no longer valid",
                        message_id
                    )));
                }
                message.pop_receipt = None;
                message.visible_at = Instant::now();
                return Ok(());
            }
        }
        Err(TransportError::NotFound(format!("message '{}'", message_id)))
    }

    async fn close(&self) {
        self.session.close();
    }
}
