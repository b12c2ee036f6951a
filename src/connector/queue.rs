// src/connector/queue.rs - Storage queue connector
//
// Messages cannot be overwritten, so re-seeding appends a newer copy of the
// record. Every message carries a monotonically increasing version and the
// harness keeps the newest copy per id. Read-back receives messages under a
// visibility timeout and releases them afterwards; nothing is ever deleted.

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::paging::paginate;
use super::session::Session;
use super::{BackendKind, ConnectionState, Connector, ConnectorOptions, RecordStream, SeedReport};
use crate::config::BackendConfig;
use crate::error::{HarnessError, Result};
use crate::record::{BackendRecord, SampleRecord, CANONICAL_FIELDS, FIELD_EXTERNAL_ID};
use crate::transport::{with_timeout, Page, QueueClient, QueueMessage, MAX_RECEIVE_BATCH};

const FIELD_VERSION: &str = "version";

/// (message id, pop receipt) of a message hidden by this enumeration
type Receipt = (String, String);

fn message_body(record: &SampleRecord, version: u64) -> Value {
    let mut body = record.to_canonical_json();
    if let Value::Object(object) = &mut body {
        object.insert(FIELD_VERSION.to_string(), Value::from(version));
    }
    body
}

fn decode(message: &QueueMessage) -> Option<BackendRecord> {
    let object = match serde_json::from_str::<Value>(&message.text) {
        Ok(Value::Object(object)) => object,
        _ => {
            debug!(message_id = %message.message_id, "Skipping message that is not a JSON object");
            return None;
        }
    };
    let record = BackendRecord::from_json_object(&object, FIELD_EXTERNAL_ID, CANONICAL_FIELDS)?;
    Some(match object.get(FIELD_VERSION).and_then(Value::as_u64) {
        Some(version) => record.with_version(version),
        None => record,
    })
}

async fn release_all(client: &dyn QueueClient, queue: &str, receipts: &[Receipt], timeout: Duration) {
    for (message_id, pop_receipt) in receipts {
        let released = with_timeout(
            timeout,
            "release message",
            client.release_message(queue, message_id, pop_receipt),
        )
        .await;
        if let Err(e) = released {
            // visibility timeout will expire on its own
            warn!(queue = %queue, message_id = %message_id, error = %e, "Failed to release message");
        }
    }
}

struct ReceiveParams {
    queue: String,
    batch: usize,
    visibility: Duration,
    timeout: Duration,
}

async fn receive_page(
    client: Arc<dyn QueueClient>,
    params: Arc<ReceiveParams>,
    held: Option<Vec<Receipt>>,
) -> Result<Page<BackendRecord, Vec<Receipt>>> {
    let mut held = held.unwrap_or_default();
    let received = with_timeout(
        params.timeout,
        "receive messages",
        client.receive_messages(&params.queue, params.batch, params.visibility),
    )
    .await;

    match received {
        Ok(messages) if messages.is_empty() => {
            debug!(queue = %params.queue, released = held.len(), "Queue drained, releasing messages");
            release_all(client.as_ref(), &params.queue, &held, params.timeout).await;
            Ok(Page::last(Vec::new()))
        }
        Ok(messages) => {
            let records = messages.iter().filter_map(decode).collect();
            held.extend(
                messages
                    .into_iter()
                    .map(|message| (message.message_id, message.pop_receipt)),
            );
            Ok(Page::next(records, held))
        }
        Err(e) => {
            release_all(client.as_ref(), &params.queue, &held, params.timeout).await;
            Err(HarnessError::Read(format!(
                "receiving from '{}': {}",
                params.queue, e
            )))
        }
    }
}

pub struct QueueConnector {
    session: Session,
    client: Arc<dyn QueueClient>,
    queue: Option<String>,
    last_version: u64,
}

impl QueueConnector {
    pub fn new(config: BackendConfig, options: ConnectorOptions, client: Arc<dyn QueueClient>) -> Self {
        Self {
            session: Session::new(config, BackendKind::Queue, options),
            client,
            queue: None,
            last_version: 0,
        }
    }

    fn queue(&self, operation: &'static str) -> Result<&str> {
        self.session.ensure_connected(operation)?;
        self.queue
            .as_deref()
            .ok_or(HarnessError::NotConnected { operation })
    }

    /// Microsecond wall clock, forced strictly increasing
    fn next_version(&mut self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_micros()).unwrap_or(0);
        self.last_version = now.max(self.last_version + 1);
        self.last_version
    }
}

#[async_trait]
impl Connector for QueueConnector {
    fn name(&self) -> &str {
        self.session.name()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Queue
    }

    fn state(&self) -> ConnectionState {
        self.session.state()
    }

    fn namespace(&self) -> Option<String> {
        self.queue.clone()
    }

    async fn connect(&mut self) -> Result<()> {
        if self.session.is_connected() {
            return Ok(());
        }
        let queue = self
            .session
            .prepare(|config| Ok(config.require("queue_name")?.to_string()))?;
        self.session.open(self.client.open()).await?;
        self.queue = Some(queue);
        Ok(())
    }

    async fn ensure_namespace(&mut self) -> Result<()> {
        let queue = self.queue("ensure_namespace")?;
        self.session
            .create_if_missing(queue, self.client.create_queue(queue))
            .await
    }

    async fn seed(&mut self, records: &[SampleRecord]) -> Result<SeedReport> {
        let queue = self.queue("seed")?.to_string();
        let mut report = SeedReport::default();

        for record in records {
            let body = message_body(record, self.next_version()).to_string();
            let result = self
                .session
                .timed("send message", self.client.send_message(&queue, &body))
                .await;
            report.record(record.external_id(), result);
        }

        Ok(report)
    }

    fn read_all(&self) -> RecordStream<'_> {
        let queue = match self.queue("read_all") {
            Ok(queue) => queue.to_string(),
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        let params = Arc::new(ReceiveParams {
            queue,
            batch: self.session.page_size().clamp(1, MAX_RECEIVE_BATCH),
            visibility: self.session.visibility_timeout(),
            timeout: self.session.step_timeout(),
        });
        let client = Arc::clone(&self.client);

        paginate(move |held| receive_page(client.clone(), params.clone(), held))
    }

    async fn disconnect(&mut self) {
        if self.session.begin_disconnect() {
            self.client.close().await;
        }
    }
}
