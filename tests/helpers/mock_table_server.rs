// tests/helpers/mock_table_server.rs - Mock Azure Table REST endpoint for testing

use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use warp::http::{HeaderValue, Method, StatusCode};
use warp::hyper::body::Bytes;
use warp::path::FullPath;
use warp::reply::Response;
use warp::{Filter, Reply};

const ACCOUNT_PATH: &str = "/devstoreaccount1/";
const SIGNATURE: &str = "mock-signature";

type EntityKey = (String, String);

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub resource: String,
    pub api_version: Option<String>,
}

#[derive(Default)]
struct TableState {
    tables: HashMap<String, BTreeMap<EntityKey, Map<String, Value>>>,
    requests: Vec<RecordedRequest>,
    page_cap: Option<usize>,
}

/// In-process stand-in for the Table service: SAS check, table creation,
/// insert-or-replace and continuation-paged queries
#[derive(Clone, Default)]
pub struct MockTableServer {
    state: Arc<Mutex<TableState>>,
}

impl MockTableServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never return more than `cap` entities per query page
    pub async fn set_page_cap(&self, cap: usize) {
        self.state.lock().await.page_cap = Some(cap);
    }

    pub async fn entity_count(&self, table: &str) -> usize {
        self.state
            .lock()
            .await
            .tables
            .get(table)
            .map(|t| t.len())
            .unwrap_or(0)
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().await.requests.clone()
    }

    pub async fn remove_entity(&self, table: &str, partition_key: &str, row_key: &str) -> bool {
        self.state
            .lock()
            .await
            .tables
            .get_mut(table)
            .and_then(|t| t.remove(&(partition_key.to_string(), row_key.to_string())))
            .is_some()
    }

    pub fn connection_string(addr: SocketAddr) -> String {
        format!(
            "TableEndpoint=http://{}/devstoreaccount1;SharedAccessSignature=sv=2019-02-02&sig={}",
            addr, SIGNATURE
        )
    }

    pub fn connection_string_with_bad_signature(addr: SocketAddr) -> String {
        format!(
            "TableEndpoint=http://{}/devstoreaccount1;SharedAccessSignature=sv=2019-02-02&sig=forged",
            addr
        )
    }

    /// Start the mock HTTP server on an ephemeral port
    pub async fn start(&self) -> SocketAddr {
        let server = self.clone();
        let routes = warp::method()
            .and(warp::path::full())
            .and(warp::query::<HashMap<String, String>>())
            .and(warp::header::optional::<String>("x-ms-version"))
            .and(warp::body::bytes())
            .and_then(
                move |method: Method,
                      path: FullPath,
                      query: HashMap<String, String>,
                      api_version: Option<String>,
                      body: Bytes| {
                    let server = server.clone();
                    async move {
                        Ok::<_, Infallible>(
                            server
                                .handle(method, path.as_str(), query, api_version, &body)
                                .await,
                        )
                    }
                },
            );

        let (addr, serve) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(serve);
        addr
    }

    async fn handle(
        &self,
        method: Method,
        path: &str,
        query: HashMap<String, String>,
        api_version: Option<String>,
        body: &[u8],
    ) -> Response {
        let resource = path.strip_prefix(ACCOUNT_PATH).unwrap_or(path).to_string();
        let mut state = self.state.lock().await;
        state.requests.push(RecordedRequest {
            method: method.to_string(),
            resource: resource.clone(),
            api_version,
        });

        if query.get("sig").map(String::as_str) != Some(SIGNATURE) {
            return error(StatusCode::FORBIDDEN, "AuthenticationFailed");
        }

        if resource == "Tables" {
            return match method {
                Method::GET => {
                    let names: Vec<Value> = state
                        .tables
                        .keys()
                        .map(|name| json!({ "TableName": name }))
                        .collect();
                    json_reply(StatusCode::OK, json!({ "value": names }))
                }
                Method::POST => {
                    let name = serde_json::from_slice::<Value>(body)
                        .ok()
                        .and_then(|v| v["TableName"].as_str().map(str::to_string));
                    match name {
                        Some(name) if state.tables.contains_key(&name) => {
                            error(StatusCode::CONFLICT, "TableAlreadyExists")
                        }
                        Some(name) => {
                            state.tables.insert(name, BTreeMap::new());
                            StatusCode::NO_CONTENT.into_response()
                        }
                        None => error(StatusCode::BAD_REQUEST, "InvalidInput"),
                    }
                }
                _ => error(StatusCode::METHOD_NOT_ALLOWED, "UnsupportedHttpVerb"),
            };
        }

        if let Some(table) = resource.strip_suffix("()") {
            if method != Method::GET {
                return error(StatusCode::METHOD_NOT_ALLOWED, "UnsupportedHttpVerb");
            }
            let page_cap = state.page_cap;
            return match state.tables.get(table) {
                Some(entities) => query_page(entities, &query, page_cap),
                None => error(StatusCode::NOT_FOUND, "TableNotFound"),
            };
        }

        match (method, parse_entity_path(&resource)) {
            (Method::PUT, Some((table, key))) => {
                let entity = match serde_json::from_slice::<Value>(body) {
                    Ok(Value::Object(object)) => object,
                    _ => return error(StatusCode::BAD_REQUEST, "InvalidInput"),
                };
                match state.tables.get_mut(&table) {
                    Some(entities) => {
                        entities.insert(key, entity);
                        StatusCode::NO_CONTENT.into_response()
                    }
                    None => error(StatusCode::NOT_FOUND, "TableNotFound"),
                }
            }
            _ => error(StatusCode::BAD_REQUEST, "InvalidUri"),
        }
    }
}

fn query_page(
    entities: &BTreeMap<EntityKey, Map<String, Value>>,
    query: &HashMap<String, String>,
    page_cap: Option<usize>,
) -> Response {
    let mut top = query
        .get("$top")
        .and_then(|t| t.parse::<usize>().ok())
        .unwrap_or(1000);
    if let Some(cap) = page_cap {
        top = top.min(cap);
    }

    let resume = query.get("NextPartitionKey").map(|partition_key| {
        (
            partition_key.clone(),
            query.get("NextRowKey").cloned().unwrap_or_default(),
        )
    });

    let mut remaining = entities
        .iter()
        .filter(|(key, _)| resume.as_ref().map_or(true, |start| *key >= start));
    let page: Vec<Value> = remaining
        .by_ref()
        .take(top)
        .map(|(_, entity)| {
            let mut entity = entity.clone();
            entity.insert("Timestamp".to_string(), json!("2024-01-01T00:00:00Z"));
            Value::Object(entity)
        })
        .collect();
    let next = remaining.next().map(|(key, _)| key.clone());

    let mut response = json_reply(StatusCode::OK, json!({ "value": page }));
    if let Some((partition_key, row_key)) = next {
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&partition_key) {
            headers.insert("x-ms-continuation-nextpartitionkey", value);
        }
        if let Ok(value) = HeaderValue::from_str(&row_key) {
            headers.insert("x-ms-continuation-nextrowkey", value);
        }
    }
    response
}

/// `people(PartitionKey='seed',RowKey='gregsp')` into its table and key
fn parse_entity_path(resource: &str) -> Option<(String, EntityKey)> {
    let (table, keys) = resource.split_once('(')?;
    let keys = keys.strip_suffix(')')?;
    let (partition, row) = keys.split_once(",RowKey=")?;
    let unquote = |s: &str| {
        s.strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .map(|s| s.replace("''", "'"))
    };
    let partition_key = unquote(partition.strip_prefix("PartitionKey=")?)?;
    let row_key = unquote(row)?;
    Some((table.to_string(), (partition_key, row_key)))
}

fn json_reply(status: StatusCode, body: Value) -> Response {
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

fn error(status: StatusCode, code: &str) -> Response {
    json_reply(
        status,
        json!({ "odata.error": { "code": code, "message": { "value": code } } }),
    )
}
