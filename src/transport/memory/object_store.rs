// src/transport/memory/object_store.rs - Simulated blob container / data lake filesystem

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tracing::debug;

use super::{page_keys, FaultPlan, SimulatedSession};
use crate::error::TransportError;
use crate::transport::{ObjectEntry, ObjectStoreClient, Page, TransportResult};

#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    session: SimulatedSession,
    containers: Arc<DashMap<String, Arc<DashMap<String, Vec<u8>>>>>,
    directories: Arc<DashSet<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Arc<FaultPlan>) -> Self {
        Self {
            session: SimulatedSession::new(faults),
            ..Self::default()
        }
    }

    pub fn faults(&self) -> &Arc<FaultPlan> {
        self.session.faults()
    }

    pub fn object_count(&self, container: &str) -> usize {
        self.containers
            .get(container)
            .map(|objects| objects.len())
            .unwrap_or(0)
    }

    pub fn has_directory(&self, container: &str, directory: &str) -> bool {
        self.directories
            .contains(&format!("{}/{}", container, directory.trim_end_matches('/')))
    }

    /// Remove an object behind the connector's back
    pub fn delete_object(&self, container: &str, path: &str) -> bool {
        self.containers
            .get(container)
            .and_then(|objects| objects.remove(path))
            .is_some()
    }

    fn container(&self, container: &str) -> TransportResult<Arc<DashMap<String, Vec<u8>>>> {
        self.containers
            .get(container)
            .map(|objects| objects.value().clone())
            .ok_or_else(|| TransportError::NotFound(format!("container '{}'", container)))
    }
}

#[async_trait]
impl ObjectStoreClient for MemoryObjectStore {
    async fn open(&self) -> TransportResult<()> {
        self.session.open()
    }

    async fn create_container(&self, container: &str) -> TransportResult<()> {
        self.session.ensure_open()?;
        self.faults().check_namespace(container)?;
        match self.containers.entry(container.to_string()) {
            Entry::Occupied(_) => Err(TransportError::AlreadyExists(format!(
                "container '{}'",
                container
            ))),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(DashMap::new()));
                debug!("Created simulated container {}", container);
                Ok(())
            }
        }
    }

    async fn create_directory(&self, container: &str, directory: &str) -> TransportResult<()> {
        self.session.ensure_open()?;
        self.container(container)?;
        let key = format!("{}/{}", container, directory.trim_end_matches('/'));
        if self.directories.insert(key) {
            Ok(())
        } else {
            Err(TransportError::AlreadyExists(format!(
                "directory '{}'",
                directory
            )))
        }
    }

    async fn put_object(&self, container: &str, path: &str, body: Vec<u8>) -> TransportResult<()> {
        self.session.ensure_open()?;
        self.faults().check_write(path)?;
        self.container(container)?.insert(path.to_string(), body);
        Ok(())
    }

    async fn get_object(&self, container: &str, path: &str) -> TransportResult<Vec<u8>> {
        self.session.ensure_open()?;
        self.container(container)?
            .get(path)
            .map(|body| body.clone())
            .ok_or_else(|| TransportError::NotFound(format!("object '{}'", path)))
    }

    async fn list_objects(
        &self,
        container: &str,
        prefix: &str,
        marker: Option<String>,
        max_results: usize,
    ) -> TransportResult<Page<ObjectEntry>> {
        self.session.ensure_open()?;
        let objects = self.container(container)?;
        self.faults().begin_page(marker.is_none())?;

        let paths: Vec<String> = objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        let (page, next) = page_keys(paths, marker.as_deref(), self.faults().page_size(max_results));

        let mut items: Vec<ObjectEntry> = page
            .into_iter()
            .filter_map(|path| {
                objects.get(&path).map(|body| ObjectEntry {
                    size: body.len() as u64,
                    path,
                })
            })
            .collect();
        self.faults().arrange(&mut items);

        Ok(Page {
            items,
            continuation: next,
        })
    }

    async fn close(&self) {
        self.session.close();
    }
}
