//! Index types, metrics and the default search-param table
//!
//! The table maps an index type to the tuning knobs a query against that
//! index needs. It is pure data, built once per process and never mutated.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Index types reported by the remote stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexType {
    /// Exhaustive scan
    Flat,
    /// Inverted file, raw vectors
    IvfFlat,
    /// Inverted file, 8-bit scalar quantization
    IvfSq8,
    /// Inverted file, product quantization
    IvfPq,
    /// Hierarchical navigable small world graph
    Hnsw,
    /// Inverted file with HNSW coarse quantizer
    IvfHnsw,
    /// Refined HNSW, raw vectors
    RhnswFlat,
    /// Refined HNSW, scalar quantization
    RhnswSq,
    /// Refined HNSW, product quantization
    RhnswPq,
    /// Random projection trees
    Annoy,
    /// Store-chosen index
    Autoindex,
}

impl IndexType {
    /// All known index types
    pub const ALL: [IndexType; 11] = [
        IndexType::Flat,
        IndexType::IvfFlat,
        IndexType::IvfSq8,
        IndexType::IvfPq,
        IndexType::Hnsw,
        IndexType::IvfHnsw,
        IndexType::RhnswFlat,
        IndexType::RhnswSq,
        IndexType::RhnswPq,
        IndexType::Annoy,
        IndexType::Autoindex,
    ];

    /// Wire name, as the stores spell it
    pub fn name(&self) -> &'static str {
        match self {
            IndexType::Flat => "FLAT",
            IndexType::IvfFlat => "IVF_FLAT",
            IndexType::IvfSq8 => "IVF_SQ8",
            IndexType::IvfPq => "IVF_PQ",
            IndexType::Hnsw => "HNSW",
            IndexType::IvfHnsw => "IVF_HNSW",
            IndexType::RhnswFlat => "RHNSW_FLAT",
            IndexType::RhnswSq => "RHNSW_SQ",
            IndexType::RhnswPq => "RHNSW_PQ",
            IndexType::Annoy => "ANNOY",
            IndexType::Autoindex => "AUTOINDEX",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase();
        IndexType::ALL.into_iter().find(|t| t.name() == upper)
    }

    /// Default query params for this index type
    pub fn default_search_params(&self) -> SearchParams {
        DEFAULT_SEARCH_PARAMS
            .get(self)
            .or_else(|| DEFAULT_SEARCH_PARAMS.get(&IndexType::IvfFlat))
            .cloned()
            .unwrap_or_default()
    }
}

impl std::fmt::Display for IndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Distance metric used to rank neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricType {
    /// Euclidean distance, smaller = closer
    #[default]
    L2,
    /// Inner product, larger = closer
    Ip,
    /// Cosine similarity, larger = closer
    Cosine,
}

impl MetricType {
    /// Wire name
    pub fn name(&self) -> &'static str {
        match self {
            MetricType::L2 => "L2",
            MetricType::Ip => "IP",
            MetricType::Cosine => "COSINE",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L2" | "EUCLIDEAN" => Some(MetricType::L2),
            "IP" | "INNER_PRODUCT" | "DOT" => Some(MetricType::Ip),
            "COSINE" => Some(MetricType::Cosine),
            _ => None,
        }
    }

    /// Whether smaller scores rank first under this metric
    pub fn smaller_is_closer(&self) -> bool {
        matches!(self, MetricType::L2)
    }

    /// Score of a vector against itself, when it is metric-independent
    ///
    /// Zero distance for L2, similarity one for COSINE. IP self-score is the
    /// squared norm, so there is no constant.
    pub fn self_score(&self) -> Option<f32> {
        match self {
            MetricType::L2 => Some(0.0),
            MetricType::Cosine => Some(1.0),
            MetricType::Ip => None,
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Index-specific query knobs (`nprobe`, `ef`, `search_k`)
pub type SearchParams = BTreeMap<String, i64>;

fn params(pairs: &[(&str, i64)]) -> SearchParams {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Default search params per index type
pub static DEFAULT_SEARCH_PARAMS: Lazy<HashMap<IndexType, SearchParams>> = Lazy::new(|| {
    let mut table = HashMap::new();
    for t in [
        IndexType::Flat,
        IndexType::IvfFlat,
        IndexType::IvfSq8,
        IndexType::IvfPq,
    ] {
        table.insert(t, params(&[("nprobe", 10)]));
    }
    for t in [
        IndexType::Hnsw,
        IndexType::RhnswFlat,
        IndexType::RhnswSq,
        IndexType::RhnswPq,
    ] {
        table.insert(t, params(&[("ef", 10)]));
    }
    table.insert(IndexType::IvfHnsw, params(&[("nprobe", 10), ("ef", 10)]));
    table.insert(IndexType::Annoy, params(&[("search_k", 10)]));
    table.insert(IndexType::Autoindex, SearchParams::new());
    table
});

/// Resolved query configuration for one collection
///
/// Resolved once per client and read-only afterwards. A new client must be
/// built if the remote index changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index type the params were chosen for
    pub index_type: IndexType,
    /// Query knobs for that index type
    pub search_params: SearchParams,
    /// Ranking metric
    pub metric_type: MetricType,
}

impl IndexConfig {
    /// Defaults for an index type with the given metric
    pub fn for_index(index_type: IndexType, metric_type: MetricType) -> Self {
        IndexConfig {
            index_type,
            search_params: index_type.default_search_params(),
            metric_type,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig::for_index(IndexType::IvfFlat, MetricType::L2)
    }
}
