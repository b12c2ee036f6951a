// src/transport/memory/mod.rs - In-process simulated transports with fault injection

use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::TransportResult;
use crate::error::TransportError;

pub mod document;
pub mod graph;
pub mod key_value;
pub mod object_store;
pub mod queue;
pub mod table;
pub mod wide_column;

pub use document::MemoryDocumentStore;
pub use graph::MemoryGraphStore;
pub use key_value::MemoryKeyValueStore;
pub use object_store::MemoryObjectStore;
pub use queue::MemoryQueueStore;
pub use table::MemoryTableStore;
pub use wide_column::MemoryWideColumnStore;

const NO_PAGE: usize = usize::MAX;

/// Faults a simulated backend should exhibit. Shared between a store and the
/// test that drives it, so faults can be switched on mid-run.
#[derive(Debug)]
pub struct FaultPlan {
    unreachable: AtomicBool,
    reject_credentials: AtomicBool,
    reject_namespace: AtomicBool,
    failing_writes: DashSet<String>,
    fail_page_at: AtomicUsize,
    page_cap: AtomicUsize,
    shuffle: AtomicBool,
    pages_served: AtomicUsize,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

impl Default for FaultPlan {
    fn default() -> Self {
        Self {
            unreachable: AtomicBool::new(false),
            reject_credentials: AtomicBool::new(false),
            reject_namespace: AtomicBool::new(false),
            failing_writes: DashSet::new(),
            fail_page_at: AtomicUsize::new(NO_PAGE),
            page_cap: AtomicUsize::new(0),
            shuffle: AtomicBool::new(false),
            pages_served: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }
}

impl FaultPlan {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_unreachable(&self, value: bool) {
        self.unreachable.store(value, Ordering::SeqCst);
    }

    pub fn reject_credentials(&self, value: bool) {
        self.reject_credentials.store(value, Ordering::SeqCst);
    }

    pub fn reject_namespace(&self, value: bool) {
        self.reject_namespace.store(value, Ordering::SeqCst);
    }

    /// Fail every write whose native key mentions `external_id`
    pub fn fail_writes_for(&self, external_id: &str) {
        self.failing_writes.insert(external_id.to_string());
    }

    pub fn clear_write_failures(&self) {
        self.failing_writes.clear();
    }

    /// Fail the page with this zero-based index in every enumeration
    pub fn fail_page_at(&self, index: usize) {
        self.fail_page_at.store(index, Ordering::SeqCst);
    }

    /// Never return more than `size` items per page
    pub fn cap_page_size(&self, size: usize) {
        self.page_cap.store(size, Ordering::SeqCst);
    }

    pub fn shuffle(&self, value: bool) {
        self.shuffle.store(value, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Pages served by the current (or most recent) enumeration
    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }

    fn check_open(&self) -> TransportResult<()> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable(
                "simulated endpoint is unreachable".to_string(),
            ));
        }
        if self.reject_credentials.load(Ordering::SeqCst) {
            return Err(TransportError::AuthRejected(
                "simulated credentials rejected".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn check_namespace(&self, namespace: &str) -> TransportResult<()> {
        if self.reject_namespace.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected(format!(
                "simulated refusal to create '{}'",
                namespace
            )));
        }
        Ok(())
    }

    pub(crate) fn check_write(&self, key: &str) -> TransportResult<()> {
        if self
            .failing_writes
            .iter()
            .any(|id| key.contains(id.as_str()))
        {
            return Err(TransportError::Rejected(format!(
                "simulated write failure for '{}'",
                key
            )));
        }
        Ok(())
    }

    /// Account for one page fetch; `first` restarts the page counter
    pub(crate) fn begin_page(&self, first: bool) -> TransportResult<()> {
        if first {
            self.pages_served.store(0, Ordering::SeqCst);
        }
        let index = self.pages_served.fetch_add(1, Ordering::SeqCst);
        if index == self.fail_page_at.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable(format!(
                "simulated failure fetching page {}",
                index
            )));
        }
        Ok(())
    }

    pub(crate) fn page_size(&self, requested: usize) -> usize {
        let cap = self.page_cap.load(Ordering::SeqCst);
        let size = if cap > 0 { requested.min(cap) } else { requested };
        size.max(1)
    }

    pub(crate) fn arrange<T>(&self, items: &mut [T]) {
        if self.shuffle.load(Ordering::SeqCst) {
            fastrand::shuffle(items);
        }
    }
}

/// Open/closed flag plus the fault plan, shared by every simulated client
#[derive(Debug, Clone)]
pub struct SimulatedSession {
    faults: Arc<FaultPlan>,
    open: Arc<AtomicBool>,
}

impl SimulatedSession {
    pub fn new(faults: Arc<FaultPlan>) -> Self {
        Self {
            faults,
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn faults(&self) -> &Arc<FaultPlan> {
        &self.faults
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub(crate) fn open(&self) -> TransportResult<()> {
        self.faults.check_open()?;
        self.open.store(true, Ordering::SeqCst);
        debug!("Simulated session opened");
        Ok(())
    }

    pub(crate) fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.faults.closes.fetch_add(1, Ordering::SeqCst);
            debug!("Simulated session closed");
        }
    }

    pub(crate) fn ensure_open(&self) -> TransportResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(TransportError::Protocol("session is not open".to_string()))
        }
    }
}

impl Default for SimulatedSession {
    fn default() -> Self {
        Self::new(FaultPlan::new())
    }
}

/// Slice an unordered key set into one page, resuming at `continuation`
/// (the first key of the page). Returns the page keys and the next token.
pub(crate) fn page_keys(
    mut keys: Vec<String>,
    continuation: Option<&str>,
    page_size: usize,
) -> (Vec<String>, Option<String>) {
    keys.sort();
    let start = match continuation {
        Some(token) => keys.partition_point(|k| k.as_str() < token),
        None => 0,
    };
    let end = (start + page_size).min(keys.len());
    let next = keys.get(end).cloned();
    (keys[start..end].to_vec(), next)
}
