// src/transport/memory/key_value.rs - Simulated Redis-style hash store

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

use super::{FaultPlan, SimulatedSession};
use crate::transport::{KeyValueClient, Page, TransportResult};

#[derive(Clone, Default)]
pub struct MemoryKeyValueStore {
    session: SimulatedSession,
    entries: Arc<DashMap<String, HashMap<String, String>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Arc<FaultPlan>) -> Self {
        Self {
            session: SimulatedSession::new(faults),
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn faults(&self) -> &Arc<FaultPlan> {
        self.session.faults()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }
}

/// Only the trailing-`*` form of glob patterns is supported
fn glob_match(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait]
impl KeyValueClient for MemoryKeyValueStore {
    async fn open(&self) -> TransportResult<()> {
        self.session.open()
    }

    async fn replace_hash(&self, key: &str, fields: Vec<(String, String)>) -> TransportResult<()> {
        self.session.ensure_open()?;
        self.faults().check_write(key)?;
        self.entries
            .insert(key.to_string(), fields.into_iter().collect());
        Ok(())
    }

    async fn get_hash(&self, key: &str) -> TransportResult<Option<HashMap<String, String>>> {
        self.session.ensure_open()?;
        Ok(self.entries.get(key).map(|hash| hash.clone()))
    }

    async fn scan(
        &self,
        cursor: Option<u64>,
        pattern: &str,
        count: usize,
    ) -> TransportResult<Page<String, u64>> {
        self.session.ensure_open()?;
        self.faults().begin_page(cursor.is_none())?;

        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| glob_match(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();

        let start = cursor.unwrap_or(0) as usize;
        let end = (start + self.faults().page_size(count)).min(keys.len());
        let mut items = keys.get(start..end).map(|s| s.to_vec()).unwrap_or_default();
        self.faults().arrange(&mut items);

        let continuation = (end < keys.len()).then_some(end as u64);
        Ok(Page {
            items,
            continuation,
        })
    }

    async fn close(&self) {
        self.session.close();
    }
}
