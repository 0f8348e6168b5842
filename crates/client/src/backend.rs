//! Vector store backend trait
//!
//! Defines the operations annlink needs from a remote ANN store. The Milvus
//! REST backend, the Tencent Cloud VectorDB backend and the in-process memory
//! store all implement it; clients only ever talk to `dyn VectorBackend`.
//!
//! IMPORTANT: implementations must not reorder search results or coerce
//! vectors. Ranking belongs to the store, validation to the clients.

use annlink_core::{
    AnnResult, CollectionDescriptor, CollectionSpec, IndexConfig, IndexSpec, RecordId, SearchHit,
    VectorRecord,
};
use serde::{Deserialize, Serialize};

/// Which store implementation to connect to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Self-hosted Milvus, RESTful v2 API
    #[default]
    Milvus,
    /// Tencent Cloud VectorDB HTTP API
    Tcvdb,
    /// In-process store with exact search
    Memory,
}

impl BackendKind {
    /// Human-readable name for display
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Milvus => "milvus",
            BackendKind::Tcvdb => "tcvdb",
            BackendKind::Memory => "memory",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "milvus" => Some(BackendKind::Milvus),
            "tcvdb" | "tencent" => Some(BackendKind::Tcvdb),
            "memory" | "mem" => Some(BackendKind::Memory),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Field names a record is laid out into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    /// Primary-key field
    pub primary_field: String,
    /// Vector field
    pub vector_field: String,
}

impl RecordLayout {
    /// Create a layout
    pub fn new(primary_field: impl Into<String>, vector_field: impl Into<String>) -> Self {
        RecordLayout {
            primary_field: primary_field.into(),
            vector_field: vector_field.into(),
        }
    }
}

/// One nearest-neighbor query
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    /// Primary-key field, used to read ids back from hits
    pub primary_field: &'a str,
    /// Vector field to search
    pub anns_field: &'a str,
    /// Query vector
    pub vector: &'a [f32],
    /// Result count
    pub limit: usize,
    /// Index params and metric
    pub index: &'a IndexConfig,
    /// Sidecar fields to return; empty means none
    pub output_fields: &'a [String],
    /// Boolean expression restricting candidates
    pub filter: Option<&'a str>,
}

/// Trait for remote vector store implementations
///
/// All methods take `&self`: implementations are shared between threads
/// behind one `Connection` and must be `Send + Sync`.
pub trait VectorBackend: Send + Sync {
    /// Which implementation this is
    fn kind(&self) -> BackendKind;

    /// Reachability and credential probe, run once when a handle opens
    fn ping(&self) -> AnnResult<()>;

    /// Check whether a collection exists
    fn has_collection(&self, name: &str) -> AnnResult<bool>;

    /// Report schema and index metadata
    fn describe_collection(&self, name: &str) -> AnnResult<CollectionDescriptor>;

    /// Create a collection with its vector index
    fn create_collection(&self, spec: &CollectionSpec) -> AnnResult<()>;

    /// Drop a collection and all its records
    fn drop_collection(&self, name: &str) -> AnnResult<()>;

    /// Delete every record, keeping the schema and indexes
    fn truncate_collection(&self, name: &str) -> AnnResult<()>;

    /// Build an index on a field
    fn create_index(&self, name: &str, field: &str, index: &IndexSpec) -> AnnResult<()>;

    /// Rebuild the vector index from the stored records
    fn rebuild_index(&self, name: &str) -> AnnResult<()>;

    /// Whether the collection must be loaded before it can be searched
    fn requires_load(&self) -> bool {
        false
    }

    /// Materialize the collection's index for querying
    fn load_collection(&self, _name: &str) -> AnnResult<()> {
        Ok(())
    }

    /// Insert or replace records; returns the count the store confirms
    fn upsert(&self, name: &str, layout: &RecordLayout, records: &[VectorRecord])
        -> AnnResult<usize>;

    /// Run one nearest-neighbor query; hits come back in store order
    fn search(&self, name: &str, request: &SearchRequest<'_>) -> AnnResult<Vec<SearchHit>>;

    /// Delete records by id; returns the count the store reports
    fn delete(&self, name: &str, ids: &[RecordId]) -> AnnResult<usize>;

    /// Number of records in the collection
    fn count(&self, name: &str) -> AnnResult<u64>;

    /// Release transport resources; must tolerate repeated calls
    fn close(&self) -> AnnResult<()> {
        Ok(())
    }
}
