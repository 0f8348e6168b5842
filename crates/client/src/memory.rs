//! In-process vector store
//!
//! `MemoryBackend` answers every query by exact search over all stored
//! records. It backs the `memory` backend kind, the CLI's offline mode and
//! the test suites. Ranking follows the remote stores:
//!
//! - L2: squared Euclidean distance, ascending
//! - IP: inner product, descending
//! - COSINE: cosine similarity, descending
//!
//! Equal scores are ordered by id ascending so results are deterministic.
//!
//! Stores opened through `Connection::open` are registered by target label,
//! so two connections to `memory://images` see the same collections. The
//! registry keeps a store alive until `MemoryStore::forget` removes it.
//!
//! Filters support the equality subset of the store grammar: `field ==
//! literal` clauses joined by `and`, where the literal is a double-quoted
//! string, a number or a boolean.

use crate::backend::{BackendKind, RecordLayout, SearchRequest, VectorBackend};
use annlink_core::{
    AnnError, AnnResult, CollectionDescriptor, CollectionSpec, FieldValue, IndexDescriptor,
    IndexSpec, MetricType, RecordId, SearchHit, Sidecar, VectorRecord,
};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

static REGISTRY: Lazy<Mutex<HashMap<String, MemoryStore>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

struct MemCollection {
    descriptor: CollectionDescriptor,
    records: BTreeMap<String, VectorRecord>,
    loaded: bool,
}

impl MemCollection {
    fn vector_field(&self) -> Option<&str> {
        self.descriptor
            .first_vector_field()
            .map(|f| f.name.as_str())
    }

    fn index_metric(&self) -> Option<MetricType> {
        self.descriptor.first_index().and_then(|i| i.metric_type)
    }
}

struct StoreInner {
    collections: RwLock<HashMap<String, MemCollection>>,
    explicit_load: bool,
}

/// Shared in-process store; clones share the same collections
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    /// Fresh store where collections are queryable right after creation
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Fresh store where collections must be loaded before search
    pub fn with_explicit_load() -> Self {
        Self::build(true)
    }

    fn build(explicit_load: bool) -> Self {
        MemoryStore {
            inner: Arc::new(StoreInner {
                collections: RwLock::new(HashMap::new()),
                explicit_load,
            }),
        }
    }

    /// Process-wide store registered under `name`, created on first use
    ///
    /// Registered stores live for the rest of the process unless removed
    /// with [`MemoryStore::forget`].
    pub fn named(name: &str) -> Self {
        REGISTRY
            .lock()
            .entry(name.to_string())
            .or_insert_with(MemoryStore::new)
            .clone()
    }

    /// Unregister a named store; returns whether one was registered
    ///
    /// Handles already holding the store keep it. The next `named` call
    /// with the same name starts from an empty store.
    pub fn forget(name: &str) -> bool {
        REGISTRY.lock().remove(name).is_some()
    }

    /// Names of all collections, sorted
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("collections", &self.collection_names())
            .field("explicit_load", &self.inner.explicit_load)
            .finish()
    }
}

/// `VectorBackend` over a `MemoryStore`
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    store: MemoryStore,
}

impl MemoryBackend {
    /// Backend over a store
    pub fn new(store: MemoryStore) -> Self {
        MemoryBackend { store }
    }

    /// The underlying store
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn missing(name: &str) -> AnnError {
        AnnError::schema(name, "collection does not exist")
    }
}

impl VectorBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn ping(&self) -> AnnResult<()> {
        Ok(())
    }

    fn has_collection(&self, name: &str) -> AnnResult<bool> {
        Ok(self.store.inner.collections.read().contains_key(name))
    }

    fn describe_collection(&self, name: &str) -> AnnResult<CollectionDescriptor> {
        let collections = self.store.inner.collections.read();
        let coll = collections.get(name).ok_or_else(|| Self::missing(name))?;
        let mut descriptor = coll.descriptor.clone();
        descriptor.loaded = Some(coll.loaded);
        descriptor.row_count = Some(coll.records.len() as u64);
        Ok(descriptor)
    }

    fn create_collection(&self, spec: &CollectionSpec) -> AnnResult<()> {
        let mut collections = self.store.inner.collections.write();
        if collections.contains_key(&spec.name) {
            return Err(AnnError::schema(&spec.name, "collection already exists"));
        }
        collections.insert(
            spec.name.clone(),
            MemCollection {
                descriptor: spec.to_descriptor(),
                records: BTreeMap::new(),
                loaded: !self.store.inner.explicit_load,
            },
        );
        Ok(())
    }

    fn drop_collection(&self, name: &str) -> AnnResult<()> {
        self.store.inner.collections.write().remove(name);
        Ok(())
    }

    fn truncate_collection(&self, name: &str) -> AnnResult<()> {
        let mut collections = self.store.inner.collections.write();
        let coll = collections.get_mut(name).ok_or_else(|| Self::missing(name))?;
        coll.records.clear();
        Ok(())
    }

    fn create_index(&self, name: &str, field: &str, index: &IndexSpec) -> AnnResult<()> {
        let mut collections = self.store.inner.collections.write();
        let coll = collections.get_mut(name).ok_or_else(|| Self::missing(name))?;
        if coll.descriptor.field(field).is_none() {
            return Err(AnnError::schema(
                name,
                format!("field '{}' does not exist", field),
            ));
        }
        coll.descriptor.indexes.retain(|i| i.field_name != field);
        coll.descriptor.indexes.push(IndexDescriptor {
            field_name: field.to_string(),
            index_name: field.to_string(),
            index_type: index.index_type.name().to_string(),
            metric_type: Some(index.metric_type),
            params: index.params.clone(),
        });
        Ok(())
    }

    fn rebuild_index(&self, name: &str) -> AnnResult<()> {
        // Exact search keeps no index state to rebuild
        if self.has_collection(name)? {
            Ok(())
        } else {
            Err(Self::missing(name))
        }
    }

    fn requires_load(&self) -> bool {
        self.store.inner.explicit_load
    }

    fn load_collection(&self, name: &str) -> AnnResult<()> {
        let mut collections = self.store.inner.collections.write();
        let coll = collections.get_mut(name).ok_or_else(|| Self::missing(name))?;
        coll.loaded = true;
        Ok(())
    }

    fn upsert(
        &self,
        name: &str,
        layout: &RecordLayout,
        records: &[VectorRecord],
    ) -> AnnResult<usize> {
        let mut collections = self.store.inner.collections.write();
        let coll = collections.get_mut(name).ok_or_else(|| Self::missing(name))?;

        let expected = coll
            .descriptor
            .field(&layout.vector_field)
            .and_then(|f| f.field_type.dimension())
            .ok_or_else(|| {
                AnnError::insert(
                    name,
                    format!("'{}' is not a vector field", layout.vector_field),
                )
            })?;

        // Check the whole batch first so a rejected batch writes nothing
        for record in records {
            if record.dimension() != expected {
                return Err(AnnError::insert(
                    name,
                    format!(
                        "record '{}' has dimension {}, expected {}",
                        record.id,
                        record.dimension(),
                        expected
                    ),
                ));
            }
            if !coll.descriptor.dynamic_fields {
                if let Some(unknown) = record
                    .sidecar
                    .keys()
                    .find(|k| coll.descriptor.field(k).is_none())
                {
                    return Err(AnnError::insert(
                        name,
                        format!("field '{}' is not in the schema", unknown),
                    ));
                }
            }
        }

        for record in records {
            coll.records
                .insert(record.id.as_str().to_string(), record.clone());
        }
        Ok(records.len())
    }

    fn search(&self, name: &str, request: &SearchRequest<'_>) -> AnnResult<Vec<SearchHit>> {
        let collections = self.store.inner.collections.read();
        let coll = collections
            .get(name)
            .ok_or_else(|| AnnError::search(name, "collection does not exist"))?;

        if !coll.loaded {
            return Err(AnnError::search(name, "collection not loaded"));
        }
        if coll.vector_field() != Some(request.anns_field) {
            return Err(AnnError::search(
                name,
                format!("'{}' is not the indexed vector field", request.anns_field),
            ));
        }
        let clauses = match request.filter {
            Some(expr) => parse_filter(expr).ok_or_else(|| {
                AnnError::search(
                    name,
                    format!(
                        "unsupported filter '{}': use `field == value` clauses joined by `and`",
                        expr
                    ),
                )
            })?,
            None => Vec::new(),
        };
        let metric = request.index.metric_type;
        if let Some(indexed) = coll.index_metric() {
            if indexed != metric {
                return Err(AnnError::search(
                    name,
                    format!(
                        "metric type not match: index built for {}, query uses {}",
                        indexed, metric
                    ),
                ));
            }
        }

        let mut scored: Vec<(f32, &VectorRecord)> = coll
            .records
            .values()
            .filter(|r| r.vector.len() == request.vector.len())
            .filter(|r| clauses.iter().all(|c| c.matches(r, request.primary_field)))
            .map(|r| (score(metric, request.vector, &r.vector), r))
            .collect();

        // Ascending distance for L2, descending similarity otherwise; id breaks ties
        scored.sort_by(|(sa, ra), (sb, rb)| {
            let by_score = if metric.smaller_is_closer() {
                sa.total_cmp(sb)
            } else {
                sb.total_cmp(sa)
            };
            by_score.then_with(|| ra.id.as_str().cmp(rb.id.as_str()))
        });

        Ok(scored
            .into_iter()
            .take(request.limit)
            .map(|(score, record)| SearchHit {
                id: record.id.clone(),
                score,
                fields: project(&record.sidecar, request.output_fields),
            })
            .collect())
    }

    fn delete(&self, name: &str, ids: &[RecordId]) -> AnnResult<usize> {
        let mut collections = self.store.inner.collections.write();
        let coll = collections.get_mut(name).ok_or_else(|| Self::missing(name))?;
        Ok(ids
            .iter()
            .filter(|id| coll.records.remove(id.as_str()).is_some())
            .count())
    }

    fn count(&self, name: &str) -> AnnResult<u64> {
        let collections = self.store.inner.collections.read();
        let coll = collections.get(name).ok_or_else(|| Self::missing(name))?;
        Ok(coll.records.len() as u64)
    }
}

/// One `field == literal` clause
#[derive(Debug, Clone, PartialEq)]
struct Equality {
    field: String,
    value: FieldValue,
}

impl Equality {
    fn matches(&self, record: &VectorRecord, primary_field: &str) -> bool {
        if self.field == primary_field {
            return self.value.as_str() == Some(record.id.as_str());
        }
        match (record.sidecar.get(&self.field), &self.value) {
            (Some(FieldValue::Int(a)), FieldValue::Float(b)) => (*a as f64) == *b,
            (Some(FieldValue::Float(a)), FieldValue::Int(b)) => *a == (*b as f64),
            (Some(stored), wanted) => stored == wanted,
            (None, _) => false,
        }
    }
}

/// Parse `field == literal [and field == literal ...]`; `None` if the
/// expression uses anything else
fn parse_filter(expr: &str) -> Option<Vec<Equality>> {
    let mut clauses = Vec::new();
    let mut rest = expr.trim();
    loop {
        let (field, after) = rest.split_once("==")?;
        let field = field.trim();
        if field.is_empty() || !field.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }
        let (value, tail) = parse_literal(after.trim_start())?;
        clauses.push(Equality {
            field: field.to_string(),
            value,
        });

        let tail = tail.trim_start();
        if tail.is_empty() {
            return Some(clauses);
        }
        rest = match tail.strip_prefix("&&") {
            Some(next) => next,
            None => {
                let next = tail.strip_prefix("and")?;
                if !next.starts_with(char::is_whitespace) {
                    return None;
                }
                next
            }
        };
    }
}

/// Leading literal of `s` and the text after it
fn parse_literal(s: &str) -> Option<(FieldValue, &str)> {
    if let Some(body) = s.strip_prefix('"') {
        let mut escaped = false;
        for (i, c) in body.char_indices() {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => {
                    let text: String = serde_json::from_str(&s[..i + 2]).ok()?;
                    return Some((FieldValue::String(text), &body[i + 1..]));
                }
                _ => escaped = false,
            }
        }
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    let (token, tail) = s.split_at(end);
    let value = serde_json::from_str::<serde_json::Value>(token).ok()?;
    if !(value.is_number() || value.is_boolean()) {
        return None;
    }
    FieldValue::from_json(&value).map(|v| (v, tail))
}

fn project(sidecar: &Sidecar, output_fields: &[String]) -> Sidecar {
    output_fields
        .iter()
        .filter_map(|f| sidecar.get(f).map(|v| (f.clone(), v.clone())))
        .collect::<BTreeMap<String, FieldValue>>()
}

/// Store-native score of `b` against query `a`
pub fn score(metric: MetricType, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        MetricType::L2 => squared_l2(a, b),
        MetricType::Ip => dot_product(a, b),
        MetricType::Cosine => cosine_similarity(a, b),
    }
}

/// Dot product (inner product)
fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Squared Euclidean distance, as Milvus reports for L2
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity; 0.0 if either vector has zero norm
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product(a, b) / (norm_a * norm_b)
    }
}
