// src/transport/mongo.rs - MongoDB / Cosmos DB for MongoDB document client

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::ClientOptions;
use mongodb::Client;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{DocumentClient, Page, TransportResult};
use crate::error::TransportError;

/// Server error code for "collection already exists"
const NAMESPACE_EXISTS: i32 = 48;

pub struct MongoDocumentClient {
    connection_string: Option<String>,
    client: RwLock<Option<Client>>,
}

impl MongoDocumentClient {
    pub fn new(connection_string: Option<String>) -> Self {
        Self {
            connection_string,
            client: RwLock::new(None),
        }
    }

    async fn client(&self) -> TransportResult<Client> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| TransportError::Protocol("session is not open".to_string()))
    }
}

fn map_mongo_error(e: MongoError) -> TransportError {
    match e.kind.as_ref() {
        ErrorKind::Authentication { .. } => TransportError::AuthRejected(e.to_string()),
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) => {
            TransportError::Unreachable(e.to_string())
        }
        ErrorKind::Command(command) if command.code == NAMESPACE_EXISTS => {
            TransportError::AlreadyExists(e.to_string())
        }
        ErrorKind::InvalidArgument { .. } => TransportError::Misconfigured(e.to_string()),
        _ => TransportError::Rejected(e.to_string()),
    }
}

fn to_document(id: &str, value: Value) -> TransportResult<Document> {
    let mut document = mongodb::bson::to_document(&value)
        .map_err(|e| TransportError::Protocol(format!("document is not BSON-compatible: {}", e)))?;
    document.insert("_id", id);
    Ok(document)
}

/// Continuations carry the last `_id` as relaxed extended JSON so a
/// non-string id (an ObjectId from an external loader) keeps its BSON type.
/// `$gt` only compares values of the same type.
fn encode_cursor(last_id: &Bson) -> String {
    last_id.clone().into_relaxed_extjson().to_string()
}

fn decode_cursor(continuation: &str) -> TransportResult<Bson> {
    let value: Value = serde_json::from_str(continuation)
        .map_err(|e| TransportError::Protocol(format!("invalid continuation: {}", e)))?;
    Bson::try_from(value).map_err(|e| TransportError::Protocol(format!("invalid continuation: {}", e)))
}

#[async_trait]
impl DocumentClient for MongoDocumentClient {
    async fn open(&self) -> TransportResult<()> {
        let connection_string = self.connection_string.as_deref().ok_or_else(|| {
            TransportError::Misconfigured("no connection string configured".to_string())
        })?;

        let options = ClientOptions::parse(connection_string)
            .await
            .map_err(|e| TransportError::Misconfigured(e.to_string()))?;
        let client = Client::with_options(options).map_err(map_mongo_error)?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(map_mongo_error)?;

        info!("🔌 Connected to MongoDB");
        *self.client.write().await = Some(client);
        Ok(())
    }

    async fn create_database(&self, database: &str) -> TransportResult<()> {
        // Databases are created implicitly with their first collection
        self.client().await?;
        debug!("Database {} will be created on first collection", database);
        Ok(())
    }

    async fn create_container(
        &self,
        database: &str,
        container: &str,
        _partition_key: Option<&str>,
    ) -> TransportResult<()> {
        self.client()
            .await?
            .database(database)
            .create_collection(container)
            .await
            .map_err(map_mongo_error)
    }

    async fn upsert_document(
        &self,
        database: &str,
        container: &str,
        id: &str,
        document: Value,
    ) -> TransportResult<()> {
        let document = to_document(id, document)?;
        self.client()
            .await?
            .database(database)
            .collection::<Document>(container)
            .replace_one(doc! { "_id": id }, document)
            .upsert(true)
            .await
            .map_err(map_mongo_error)?;
        Ok(())
    }

    async fn query_documents(
        &self,
        database: &str,
        container: &str,
        continuation: Option<String>,
        max_items: usize,
    ) -> TransportResult<Page<Value>> {
        let collection = self
            .client()
            .await?
            .database(database)
            .collection::<Document>(container);

        // Resume after the last _id seen; stable without server-side cursors
        let filter = match &continuation {
            Some(cursor) => {
                let after = decode_cursor(cursor)?;
                doc! { "_id": { "$gt": after } }
            }
            None => doc! {},
        };

        let mut cursor = collection
            .find(filter)
            .sort(doc! { "_id": 1 })
            .limit(max_items as i64)
            .await
            .map_err(map_mongo_error)?;

        let mut items = Vec::new();
        let mut last_id = None;
        while let Some(document) = cursor.try_next().await.map_err(map_mongo_error)? {
            if let Some(id) = document.get("_id") {
                last_id = Some(encode_cursor(id));
            }
            items.push(Bson::Document(document).into_relaxed_extjson());
        }

        let next = if items.len() == max_items { last_id } else { None };
        Ok(Page {
            items,
            continuation: next,
        })
    }

    async fn close(&self) {
        if let Some(client) = self.client.write().await.take() {
            client.shutdown().await;
        }
    }
}
