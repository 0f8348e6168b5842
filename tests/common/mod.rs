//! Shared test utilities for all integration test suites.
//!
//! Import via `mod common;` from any test's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub use annlink::{
    path_sidecar, AnnError, AnnResult, BackendKind, CollectionDescriptor, CollectionSpec,
    Connection, ErrorKind, IndexSpec, IndexType, MemoryBackend, MemoryStore, MetricType,
    NewRecord, RecordId, RecordLayout, SearchClient, SearchHit, SearchOverrides, SearchRequest,
    UpsertClient, VectorBackend, VectorRecord,
};

// ============================================================================
// Connections
// ============================================================================

/// Open a handle onto a memory store
pub fn memory_connection(store: &MemoryStore) -> Connection {
    Connection::from_backend(Box::new(MemoryBackend::new(store.clone()))).unwrap()
}

/// Store with one empty collection
pub fn store_with(spec: &CollectionSpec) -> MemoryStore {
    let store = MemoryStore::new();
    memory_connection(&store).create_collection(spec).unwrap();
    store
}

/// `n` points along the x axis at x = 0, 1, ..., n-1, keyed `p0`, `p1`, ...
pub fn line_points(n: usize, dim: usize) -> Vec<NewRecord> {
    (0..n)
        .map(|i| {
            let mut v = vec![0.0f32; dim];
            v[0] = i as f32;
            NewRecord::keyed(format!("p{}", i), v, path_sidecar(format!("img/{}.jpg", i)))
        })
        .collect()
}

pub fn ids(hits: &[SearchHit]) -> Vec<String> {
    hits.iter().map(|h| h.id.as_str().to_string()).collect()
}

// ============================================================================
// ScriptedBackend - memory backend with fault injection and call counters
// ============================================================================

/// Call counters shared between a `ScriptedBackend` and the test
#[derive(Debug, Default, Clone)]
pub struct Probe {
    pub loads: Arc<AtomicUsize>,
    pub searches: Arc<AtomicUsize>,
    pub upserts: Arc<AtomicUsize>,
}

impl Probe {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

/// Delegates to a memory backend, counting calls
///
/// `short_by` makes every upsert write and confirm that many fewer records
/// than it was given, like a store that silently drops part of a batch.
pub struct ScriptedBackend {
    inner: MemoryBackend,
    probe: Probe,
    short_by: usize,
}

impl ScriptedBackend {
    pub fn new(store: MemoryStore) -> (Self, Probe) {
        let probe = Probe::default();
        let backend = ScriptedBackend {
            inner: MemoryBackend::new(store),
            probe: probe.clone(),
            short_by: 0,
        };
        (backend, probe)
    }

    pub fn short_by(mut self, n: usize) -> Self {
        self.short_by = n;
        self
    }

    pub fn connect(self) -> Connection {
        Connection::from_backend(Box::new(self)).unwrap()
    }
}

impl VectorBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn ping(&self) -> AnnResult<()> {
        self.inner.ping()
    }

    fn has_collection(&self, name: &str) -> AnnResult<bool> {
        self.inner.has_collection(name)
    }

    fn describe_collection(&self, name: &str) -> AnnResult<CollectionDescriptor> {
        self.inner.describe_collection(name)
    }

    fn create_collection(&self, spec: &CollectionSpec) -> AnnResult<()> {
        self.inner.create_collection(spec)
    }

    fn drop_collection(&self, name: &str) -> AnnResult<()> {
        self.inner.drop_collection(name)
    }

    fn truncate_collection(&self, name: &str) -> AnnResult<()> {
        self.inner.truncate_collection(name)
    }

    fn create_index(&self, name: &str, field: &str, index: &IndexSpec) -> AnnResult<()> {
        self.inner.create_index(name, field, index)
    }

    fn rebuild_index(&self, name: &str) -> AnnResult<()> {
        self.inner.rebuild_index(name)
    }

    fn requires_load(&self) -> bool {
        self.inner.requires_load()
    }

    fn load_collection(&self, name: &str) -> AnnResult<()> {
        self.probe.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_collection(name)
    }

    fn upsert(
        &self,
        name: &str,
        layout: &RecordLayout,
        records: &[VectorRecord],
    ) -> AnnResult<usize> {
        self.probe.upserts.fetch_add(1, Ordering::SeqCst);
        let kept = records.len().saturating_sub(self.short_by);
        self.inner.upsert(name, layout, &records[..kept])
    }

    fn search(&self, name: &str, request: &SearchRequest<'_>) -> AnnResult<Vec<SearchHit>> {
        self.probe.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search(name, request)
    }

    fn delete(&self, name: &str, ids: &[RecordId]) -> AnnResult<usize> {
        self.inner.delete(name, ids)
    }

    fn count(&self, name: &str) -> AnnResult<u64> {
        self.inner.count(name)
    }
}
