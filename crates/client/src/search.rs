//! Search client
//!
//! Resolves the query configuration of one collection at construction and
//! reuses it for every query. Each `search` call issues exactly one remote
//! query and returns hits in the order the store ranked them.
//!
//! The client is `Send + Sync`. Its only mutable state is the loaded flag,
//! guarded by a lock so the one-time load runs once.

use crate::backend::SearchRequest;
use crate::connection::Connection;
use annlink_core::{
    resolve, validate_vector, AnnError, AnnResult, FieldType, ResolvedSearch, SearchHit,
    SearchOverrides,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Runs nearest-neighbor queries against one collection
pub struct SearchClient {
    connection: Connection,
    collection: String,
    primary_field: String,
    resolved: ResolvedSearch,
    loaded: AtomicBool,
    load_lock: Mutex<()>,
}

impl SearchClient {
    /// Bind a collection and resolve its query configuration
    ///
    /// # Errors
    ///
    /// `Schema` if the collection does not exist, has no primary key or no
    /// float vector field to search; anything `resolve` rejects.
    pub fn new(
        connection: Connection,
        collection: &str,
        overrides: SearchOverrides,
    ) -> AnnResult<Self> {
        let descriptor = connection.describe_collection(collection)?;
        let resolved = resolve(&descriptor, &overrides)?;

        if let Some(field) = descriptor.field(&resolved.anns_field) {
            if matches!(field.field_type, FieldType::BinaryVector { .. }) {
                return Err(AnnError::schema(
                    collection,
                    format!(
                        "vector field '{}' is binary; only float queries are supported",
                        field.name
                    ),
                ));
            }
        }

        let primary_field = descriptor
            .primary_field()
            .map(|f| f.name.clone())
            .ok_or_else(|| AnnError::schema(collection, "collection has no primary key"))?;

        let needs_load = connection.backend()?.requires_load();
        let already_loaded = !needs_load || descriptor.loaded == Some(true);

        tracing::info!(
            target: "annlink::search",
            handle = %connection.id(),
            collection,
            index_type = %resolved.index.index_type,
            metric = %resolved.index.metric_type,
            anns_field = %resolved.anns_field,
            limit = resolved.limit,
            "Bound search client"
        );

        Ok(SearchClient {
            connection,
            collection: collection.to_string(),
            primary_field,
            resolved,
            loaded: AtomicBool::new(already_loaded),
            load_lock: Mutex::new(()),
        })
    }

    /// Bound collection name
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Configuration used for every query
    pub fn resolved(&self) -> &ResolvedSearch {
        &self.resolved
    }

    /// The underlying connection
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Load the collection once, before the first query
    fn ensure_loaded(&self) -> AnnResult<()> {
        if self.loaded.load(Ordering::Acquire) {
            return Ok(());
        }
        // Serialize loaders so concurrent first queries issue one load
        let _guard = self.load_lock.lock();
        if self.loaded.load(Ordering::Acquire) {
            return Ok(());
        }
        self.connection
            .backend()?
            .load_collection(&self.collection)
            .map_err(|e| AnnError::search(&self.collection, format!("load failed: {}", e)))?;
        self.loaded.store(true, Ordering::Release);
        tracing::info!(
            target: "annlink::search",
            handle = %self.connection.id(),
            collection = %self.collection,
            "Loaded collection"
        );
        Ok(())
    }

    /// Nearest neighbors of `query`, in store order
    ///
    /// `limit` overrides the resolved limit for this call only.
    pub fn search(&self, query: &[f32], limit: Option<usize>) -> AnnResult<Vec<SearchHit>> {
        let limit = limit.unwrap_or(self.resolved.limit);
        if limit == 0 {
            return Err(AnnError::invalid_input("search limit must be > 0"));
        }
        validate_vector(&self.collection, self.resolved.dimension, query)?;

        let backend = self.connection.backend()?;
        self.ensure_loaded()?;

        let request = SearchRequest {
            primary_field: &self.primary_field,
            anns_field: &self.resolved.anns_field,
            vector: query,
            limit,
            index: &self.resolved.index,
            output_fields: &self.resolved.output_fields,
            filter: self.resolved.filter.as_deref(),
        };
        let hits = backend
            .search(&self.collection, &request)
            .map_err(|e| match e {
                AnnError::Search { .. } | AnnError::Connection { .. } => e,
                other => AnnError::search(&self.collection, other.to_string()),
            })?;

        tracing::debug!(
            target: "annlink::search",
            handle = %self.connection.id(),
            collection = %self.collection,
            limit,
            hits = hits.len(),
            "Search complete"
        );
        Ok(hits)
    }

    /// One query per vector, issued sequentially
    pub fn search_batch(
        &self,
        queries: &[Vec<f32>],
        limit: Option<usize>,
    ) -> AnnResult<Vec<Vec<SearchHit>>> {
        queries.iter().map(|q| self.search(q, limit)).collect()
    }
}

impl std::fmt::Debug for SearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchClient")
            .field("connection", &self.connection)
            .field("collection", &self.collection)
            .field("resolved", &self.resolved)
            .field("loaded", &self.loaded.load(Ordering::Relaxed))
            .finish()
    }
}
