// src/transport/table_rest.rs - Azure Table service over REST (SAS authentication)

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use super::{Page, TableClient, TableContinuation, TableEntity, TransportResult};
use crate::error::TransportError;

const API_VERSION: &str = "2019-02-02";
const ACCEPT_NO_METADATA: &str = "application/json;odata=nometadata";
const NEXT_PARTITION_KEY: &str = "x-ms-continuation-NextPartitionKey";
const NEXT_ROW_KEY: &str = "x-ms-continuation-NextRowKey";

/// Parsed `TableEndpoint=...;SharedAccessSignature=...` connection string
#[derive(Debug, Clone, PartialEq)]
pub struct TableEndpoint {
    pub base: Url,
    pub sas_token: String,
}

impl TableEndpoint {
    pub fn parse(connection_string: &str) -> TransportResult<Self> {
        let mut endpoint = None;
        let mut sas_token = None;
        let mut has_account_key = false;

        for part in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                TransportError::Misconfigured(format!("malformed connection string segment '{}'", part))
            })?;
            match key {
                "TableEndpoint" => endpoint = Some(value.to_string()),
                "SharedAccessSignature" => {
                    sas_token = Some(value.trim_start_matches('?').to_string())
                }
                "AccountKey" => has_account_key = true,
                _ => {}
            }
        }

        let endpoint = endpoint.ok_or_else(|| {
            TransportError::Misconfigured("connection string has no TableEndpoint".to_string())
        })?;
        let sas_token = match sas_token {
            Some(token) if !token.is_empty() => token,
            _ if has_account_key => {
                return Err(TransportError::Misconfigured(
                    "shared key authentication is not supported; use a SharedAccessSignature"
                        .to_string(),
                ))
            }
            _ => {
                return Err(TransportError::Misconfigured(
                    "connection string has no SharedAccessSignature".to_string(),
                ))
            }
        };

        let base = Url::parse(&endpoint).map_err(|e| {
            TransportError::Misconfigured(format!("invalid TableEndpoint '{}': {}", endpoint, e))
        })?;

        Ok(Self { base, sas_token })
    }

    /// Resource URL with the SAS token and extra query pairs applied
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.base.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}/{}", base_path, path));
        url.set_query(Some(&self.sas_token));
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        url
    }
}

fn escape_key(key: &str) -> String {
    key.replace('\'', "''")
}

fn entity_path(table: &str, partition_key: &str, row_key: &str) -> String {
    format!(
        "{}(PartitionKey='{}',RowKey='{}')",
        table,
        escape_key(partition_key),
        escape_key(row_key)
    )
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    value: Vec<Value>,
}

pub struct AzureTableRestClient {
    connection_string: Option<String>,
    http_client: reqwest::Client,
    endpoint: RwLock<Option<TableEndpoint>>,
}

impl AzureTableRestClient {
    pub fn new(connection_string: Option<String>, request_timeout: Duration) -> TransportResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Misconfigured(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            connection_string,
            http_client,
            endpoint: RwLock::new(None),
        })
    }

    async fn endpoint(&self) -> TransportResult<TableEndpoint> {
        self.endpoint
            .read()
            .await
            .clone()
            .ok_or_else(|| TransportError::Protocol("session is not open".to_string()))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header("Accept", ACCEPT_NO_METADATA)
            .header("x-ms-version", API_VERSION)
            .header(
                "x-ms-date",
                Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            )
    }

    async fn send(&self, builder: RequestBuilder) -> TransportResult<Response> {
        let response = builder.send().await.map_err(map_reqwest_error)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(map_status(status, &body))
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_connect() || e.is_timeout() {
        TransportError::Unreachable(e.to_string())
    } else {
        TransportError::Protocol(e.to_string())
    }
}

fn map_status(status: StatusCode, body: &str) -> TransportError {
    let detail = format!("HTTP {}: {}", status.as_u16(), body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::AuthRejected(detail),
        StatusCode::NOT_FOUND => TransportError::NotFound(detail),
        StatusCode::CONFLICT => TransportError::AlreadyExists(detail),
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            TransportError::Unreachable(detail)
        }
        _ => TransportError::Rejected(detail),
    }
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl TableClient for AzureTableRestClient {
    async fn open(&self) -> TransportResult<()> {
        let connection_string = self.connection_string.as_deref().ok_or_else(|| {
            TransportError::Misconfigured("no connection string configured".to_string())
        })?;
        let endpoint = TableEndpoint::parse(connection_string)?;

        // Listing one table proves reachability and that the SAS token is accepted
        let probe = endpoint.url("Tables", &[("$top", "1")]);
        self.send(self.request(Method::GET, probe)).await?;

        info!("🔌 Connected to table endpoint {}", endpoint.base);
        *self.endpoint.write().await = Some(endpoint);
        Ok(())
    }

    async fn create_table(&self, table: &str) -> TransportResult<()> {
        let endpoint = self.endpoint().await?;
        let request = self
            .request(Method::POST, endpoint.url("Tables", &[]))
            .header("Prefer", "return-no-content")
            .json(&json!({ "TableName": table }));
        self.send(request).await?;
        debug!("Created table {}", table);
        Ok(())
    }

    async fn upsert_entity(&self, table: &str, entity: &TableEntity) -> TransportResult<()> {
        let endpoint = self.endpoint().await?;
        let path = entity_path(table, &entity.partition_key, &entity.row_key);
        // PUT without If-Match is insert-or-replace
        let request = self
            .request(Method::PUT, endpoint.url(&path, &[]))
            .json(&entity.to_json());
        self.send(request).await?;
        Ok(())
    }

    async fn query_entities(
        &self,
        table: &str,
        continuation: Option<TableContinuation>,
        top: usize,
    ) -> TransportResult<Page<TableEntity, TableContinuation>> {
        let endpoint = self.endpoint().await?;
        let top = top.to_string();
        let mut query = vec![("$top", top.as_str())];
        if let Some(token) = &continuation {
            query.push(("NextPartitionKey", token.next_partition_key.as_str()));
            if let Some(row_key) = &token.next_row_key {
                query.push(("NextRowKey", row_key.as_str()));
            }
        }

        let url = endpoint.url(&format!("{}()", table), &query);
        let response = self.send(self.request(Method::GET, url)).await?;

        let next = header_value(&response, NEXT_PARTITION_KEY).map(|partition_key| {
            TableContinuation {
                next_partition_key: partition_key,
                next_row_key: header_value(&response, NEXT_ROW_KEY),
            }
        });

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Protocol(format!("invalid query response: {}", e)))?;
        let items = body
            .value
            .into_iter()
            .map(TableEntity::from_json)
            .collect::<TransportResult<Vec<_>>>()?;

        Ok(Page {
            items,
            continuation: next,
        })
    }

    async fn close(&self) {
        *self.endpoint.write().await = None;
    }
}
