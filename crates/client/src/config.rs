//! Client configuration sections
//!
//! These structs mirror the `[backend]`, `[collection]` and `[search]`
//! sections of `annlink.toml`. Each section knows how to turn itself into the
//! runtime value it describes: a `Connection`, a `CollectionSpec`, or a set
//! of `SearchOverrides`.

use crate::backend::BackendKind;
use crate::connection::{ConnectOptions, Connection, Credentials, Target};
use crate::tcvdb::{ReadConsistency, ID_FIELD, VECTOR_FIELD};
use annlink_core::{
    validate_collection_name, AnnError, AnnResult, CollectionSpec, IndexSpec, IndexType,
    MetricType, SearchOverrides, SearchParams, DEFAULT_LIMIT,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// `[backend]`: where the store is and how to authenticate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// `"milvus"`, `"tcvdb"` or `"memory"`
    #[serde(default)]
    pub kind: BackendKind,
    /// Host, used when `uri` is not set
    #[serde(default = "default_host")]
    pub host: String,
    /// Port, used when `uri` is not set
    #[serde(default = "default_port")]
    pub port: u16,
    /// Full endpoint URI; required for token auth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Account name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password or API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// API token; mutually exclusive with username/password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Database (managed store only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Use https for host/port targets
    #[serde(default)]
    pub secure: bool,
    /// Request timeout in milliseconds (default: 20000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// `"eventual"` (default) or `"strong"` (managed store only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_consistency: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    19530
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            host: default_host(),
            port: default_port(),
            uri: None,
            username: None,
            password: None,
            token: None,
            database: None,
            secure: false,
            timeout_ms: default_timeout_ms(),
            read_consistency: None,
        }
    }
}

impl BackendConfig {
    /// Store address
    pub fn target(&self) -> Target {
        match &self.uri {
            Some(uri) => Target::uri(uri.clone()),
            None => Target::host_port(self.host.clone(), self.port),
        }
    }

    /// Credentials implied by the configured fields
    pub fn credentials(&self) -> AnnResult<Credentials> {
        match (&self.token, &self.username) {
            (Some(_), Some(_)) => Err(AnnError::config(
                "[backend] sets both token and username; use one",
            )),
            (Some(token), None) => Ok(Credentials::token(token.clone())),
            (None, Some(username)) => Ok(Credentials::basic(
                username.clone(),
                self.password.clone().unwrap_or_default(),
            )),
            (None, None) => Ok(Credentials::None),
        }
    }

    /// Connection options
    pub fn options(&self) -> AnnResult<ConnectOptions> {
        let mut options = ConnectOptions::new(self.kind)
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_secure(self.secure);
        if let Some(db) = &self.database {
            options = options.with_database(db.clone());
        }
        if let Some(rc) = &self.read_consistency {
            let parsed = ReadConsistency::parse(rc).ok_or_else(|| {
                AnnError::config(format!(
                    "Invalid read_consistency '{}'. Expected \"eventual\" or \"strong\".",
                    rc
                ))
            })?;
            options = options.with_read_consistency(parsed);
        }
        Ok(options)
    }

    /// Check the section without connecting
    pub fn validate(&self) -> AnnResult<()> {
        if self.timeout_ms == 0 {
            return Err(AnnError::config("[backend] timeout_ms must be > 0"));
        }
        if self.uri.is_none() && self.host.is_empty() {
            return Err(AnnError::config("[backend] needs host or uri"));
        }
        if self.token.is_some() && self.uri.is_none() {
            return Err(AnnError::config("[backend] token auth requires uri"));
        }
        if self.kind == BackendKind::Tcvdb && self.username.is_none() {
            return Err(AnnError::config(
                "[backend] tcvdb requires username and password (API key)",
            ));
        }
        self.credentials()?;
        self.options()?;
        Ok(())
    }

    /// Open a connection
    pub fn connect(&self) -> AnnResult<Connection> {
        self.validate()?;
        Connection::open(self.target(), self.credentials()?, self.options()?)
    }
}

/// `[collection]`: which collection and how to create it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionConfig {
    /// Collection name
    #[serde(default = "default_collection_name")]
    pub name: String,
    /// Vector dimension
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Vector index type for newly created collections
    #[serde(default = "default_index_type")]
    pub index_type: String,
    /// Metric for newly created collections
    #[serde(default = "default_metric_type")]
    pub metric_type: String,
    /// IVF cluster count
    #[serde(default = "default_nlist")]
    pub nlist: u32,
    /// HNSW graph degree
    #[serde(default = "default_m")]
    pub m: u32,
    /// HNSW construction beam
    #[serde(default = "default_ef_construction")]
    pub ef_construction: u32,
    /// Shard count (managed store only)
    #[serde(default = "default_shards")]
    pub shards: u32,
    /// Replica count (managed store only)
    #[serde(default)]
    pub replicas: u32,
}

fn default_collection_name() -> String {
    "reverse_image_search".to_string()
}

fn default_dimension() -> usize {
    2048
}

fn default_index_type() -> String {
    "IVF_FLAT".to_string()
}

fn default_metric_type() -> String {
    "L2".to_string()
}

fn default_nlist() -> u32 {
    2048
}

fn default_m() -> u32 {
    16
}

fn default_ef_construction() -> u32 {
    200
}

fn default_shards() -> u32 {
    1
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: default_collection_name(),
            dimension: default_dimension(),
            index_type: default_index_type(),
            metric_type: default_metric_type(),
            nlist: default_nlist(),
            m: default_m(),
            ef_construction: default_ef_construction(),
            shards: default_shards(),
            replicas: 0,
        }
    }
}

impl CollectionConfig {
    fn parsed_index_type(&self) -> AnnResult<IndexType> {
        IndexType::parse(&self.index_type).ok_or_else(|| {
            AnnError::config(format!("Unknown index_type '{}'", self.index_type))
        })
    }

    fn parsed_metric(&self) -> AnnResult<MetricType> {
        MetricType::parse(&self.metric_type).ok_or_else(|| {
            AnnError::config(format!(
                "Unknown metric_type '{}'. Expected \"L2\", \"IP\" or \"COSINE\".",
                self.metric_type
            ))
        })
    }

    /// Check the section
    pub fn validate(&self) -> AnnResult<()> {
        validate_collection_name(&self.name).map_err(|e| AnnError::config(e.to_string()))?;
        if self.dimension == 0 {
            return Err(AnnError::config("[collection] dimension must be > 0"));
        }
        self.parsed_index_type()?;
        self.parsed_metric()?;
        Ok(())
    }

    /// Vector index to build
    pub fn index_spec(&self) -> AnnResult<IndexSpec> {
        let metric = self.parsed_metric()?;
        Ok(match self.parsed_index_type()? {
            IndexType::IvfFlat => IndexSpec::ivf_flat(self.nlist).with_metric(metric),
            IndexType::Hnsw => IndexSpec::hnsw(metric, self.m, self.ef_construction),
            other => IndexSpec {
                index_type: other,
                metric_type: metric,
                params: BTreeMap::new(),
            },
        })
    }

    /// Creation spec for a backend kind
    ///
    /// The managed store fixes its field names, so the generated `CollectionSpec` uses them.
    pub fn to_spec(&self, kind: BackendKind) -> AnnResult<CollectionSpec> {
        self.validate()?;
        let mut spec = CollectionSpec::new(self.name.clone(), self.dimension)
            .with_index(self.index_spec()?)
            .with_topology(self.shards, self.replicas);
        if kind == BackendKind::Tcvdb {
            spec = spec
                .with_primary_field(ID_FIELD)
                .with_vector_field(VECTOR_FIELD);
        }
        Ok(spec)
    }
}

/// `[search]`: query defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Results per query (default: 10)
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Sidecar fields returned with each hit
    #[serde(default = "default_output_fields")]
    pub output_fields: Vec<String>,
    /// Ranking metric; defaults to the collection's index metric
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<String>,
    /// Explicit query knobs, e.g. `{ nprobe = 32 }`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<SearchParams>,
    /// Filter expression applied to every query, e.g. `path like "cats/%"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_output_fields() -> Vec<String> {
    vec!["path".to_string()]
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            output_fields: default_output_fields(),
            metric_type: None,
            params: None,
            filter: None,
        }
    }
}

impl SearchConfig {
    /// Check the section
    pub fn validate(&self) -> AnnResult<()> {
        self.to_overrides().map(|_| ())
    }

    /// Overrides for the resolver
    pub fn to_overrides(&self) -> AnnResult<SearchOverrides> {
        if self.limit == 0 {
            return Err(AnnError::config("[search] limit must be > 0"));
        }
        let mut overrides = SearchOverrides::default()
            .limit(self.limit)
            .output_fields(self.output_fields.iter().cloned());
        if let Some(metric) = &self.metric_type {
            let parsed = MetricType::parse(metric).ok_or_else(|| {
                AnnError::config(format!("Unknown [search] metric_type '{}'", metric))
            })?;
            overrides = overrides.metric_type(parsed);
        }
        if let Some(params) = &self.params {
            overrides = overrides.search_params(params.clone());
        }
        if let Some(filter) = &self.filter {
            overrides = overrides.filter(filter.clone());
        }
        Ok(overrides)
    }
}

/// The three client sections together
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// `[backend]`
    #[serde(default)]
    pub backend: BackendConfig,
    /// `[collection]`
    #[serde(default)]
    pub collection: CollectionConfig,
    /// `[search]`
    #[serde(default)]
    pub search: SearchConfig,
}

impl ClientConfig {
    /// Validate every section
    pub fn validate(&self) -> AnnResult<()> {
        self.backend.validate()?;
        self.collection.validate()?;
        self.search.validate()
    }

    /// Creation spec for the configured collection
    pub fn collection_spec(&self) -> AnnResult<CollectionSpec> {
        self.collection.to_spec(self.backend.kind)
    }
}
