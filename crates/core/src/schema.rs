//! Collection schema descriptors
//!
//! `CollectionDescriptor` is what a store reports for an existing collection
//! (fields plus configured indexes). `CollectionSpec` is what a caller hands
//! to a store to create one.

use crate::index::{IndexType, MetricType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared type of a collection field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    /// Boolean scalar
    Bool,
    /// 64-bit integer scalar
    Int64,
    /// 32-bit float scalar
    Float,
    /// 64-bit float scalar
    Double,
    /// Bounded string
    VarChar {
        /// Maximum length in bytes
        max_length: usize,
    },
    /// Schemaless JSON blob
    Json,
    /// Dense float vector
    FloatVector {
        /// Vector dimension
        dim: usize,
    },
    /// Packed binary vector
    BinaryVector {
        /// Vector dimension in bits
        dim: usize,
    },
}

impl FieldType {
    /// Whether this field can be an ANN search target
    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            FieldType::FloatVector { .. } | FieldType::BinaryVector { .. }
        )
    }

    /// Vector dimension, if this is a vector field
    pub fn dimension(&self) -> Option<usize> {
        match self {
            FieldType::FloatVector { dim } | FieldType::BinaryVector { dim } => Some(*dim),
            _ => None,
        }
    }
}

/// One field of a collection schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Field name
    pub name: String,
    /// Declared type
    pub field_type: FieldType,
    /// Whether this is the primary key
    #[serde(default)]
    pub is_primary: bool,
}

impl FieldSchema {
    /// A non-primary field
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldSchema {
            name: name.into(),
            field_type,
            is_primary: false,
        }
    }

    /// A primary-key field
    pub fn primary(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldSchema {
            name: name.into(),
            field_type,
            is_primary: true,
        }
    }
}

/// An index as reported by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Indexed field
    pub field_name: String,
    /// Index name (often equal to the field name)
    #[serde(default)]
    pub index_name: String,
    /// Raw index type string; parsed by the resolver
    pub index_type: String,
    /// Metric the index was built for, when reported
    #[serde(default)]
    pub metric_type: Option<MetricType>,
    /// Build params (`nlist`, `M`, `efConstruction`)
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
}

/// Schema and index metadata of an existing collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    /// Collection name
    pub name: String,
    /// Declared fields, in schema order
    pub fields: Vec<FieldSchema>,
    /// Configured indexes, in creation order
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    /// Whether fields not in `fields` may be written and read back
    #[serde(default)]
    pub dynamic_fields: bool,
    /// Load state, when the store reports one
    #[serde(default)]
    pub loaded: Option<bool>,
    /// Row count, when the store reports one
    #[serde(default)]
    pub row_count: Option<u64>,
}

impl CollectionDescriptor {
    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The primary-key field, if declared
    pub fn primary_field(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_primary)
    }

    /// The first field of vector type, in schema order
    pub fn first_vector_field(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.field_type.is_vector())
    }

    /// The first configured index, if any
    pub fn first_index(&self) -> Option<&IndexDescriptor> {
        self.indexes.first()
    }
}

/// Index to build on a vector field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index type
    pub index_type: IndexType,
    /// Metric the index is built for
    pub metric_type: MetricType,
    /// Build params
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl IndexSpec {
    /// IVF_FLAT / L2 with `nlist = 2048`
    pub fn ivf_flat(nlist: u32) -> Self {
        let mut params = BTreeMap::new();
        params.insert("nlist".to_string(), serde_json::json!(nlist));
        IndexSpec {
            index_type: IndexType::IvfFlat,
            metric_type: MetricType::L2,
            params,
        }
    }

    /// HNSW with the given graph degree and construction beam
    pub fn hnsw(metric_type: MetricType, m: u32, ef_construction: u32) -> Self {
        let mut params = BTreeMap::new();
        params.insert("M".to_string(), serde_json::json!(m));
        params.insert("efConstruction".to_string(), serde_json::json!(ef_construction));
        IndexSpec {
            index_type: IndexType::Hnsw,
            metric_type,
            params,
        }
    }

    /// Override the metric
    pub fn with_metric(mut self, metric_type: MetricType) -> Self {
        self.metric_type = metric_type;
        self
    }
}

impl Default for IndexSpec {
    fn default() -> Self {
        IndexSpec::ivf_flat(2048)
    }
}

/// Everything needed to create a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Collection name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Vector dimension
    pub dimension: usize,
    /// Primary-key field name (string keys)
    pub primary_field: String,
    /// Maximum primary-key length
    pub primary_max_length: usize,
    /// Vector field name
    pub vector_field: String,
    /// Additional scalar fields
    #[serde(default)]
    pub scalar_fields: Vec<FieldSchema>,
    /// Vector index
    #[serde(default)]
    pub index: IndexSpec,
    /// Shard count (managed store only)
    #[serde(default = "default_shards")]
    pub shards: u32,
    /// Replica count (managed store only)
    #[serde(default)]
    pub replicas: u32,
}

fn default_shards() -> u32 {
    1
}

impl CollectionSpec {
    /// Image-embedding collection: string id, `embedding` vector, `path` sidecar
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        CollectionSpec {
            name: name.into(),
            description: "image embedding collection".to_string(),
            dimension,
            primary_field: "id".to_string(),
            primary_max_length: 64,
            vector_field: "embedding".to_string(),
            scalar_fields: vec![FieldSchema::new(
                "path",
                FieldType::VarChar { max_length: 500 },
            )],
            index: IndexSpec::default(),
            shards: default_shards(),
            replicas: 0,
        }
    }

    /// Override the vector index
    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.index = index;
        self
    }

    /// Override the vector field name
    pub fn with_vector_field(mut self, name: impl Into<String>) -> Self {
        self.vector_field = name.into();
        self
    }

    /// Override the primary field name
    pub fn with_primary_field(mut self, name: impl Into<String>) -> Self {
        self.primary_field = name.into();
        self
    }

    /// Override the shard and replica counts
    pub fn with_topology(mut self, shards: u32, replicas: u32) -> Self {
        self.shards = shards;
        self.replicas = replicas;
        self
    }

    /// Full field list, primary key first, then vector, then scalars
    pub fn fields(&self) -> Vec<FieldSchema> {
        let mut fields = vec![
            FieldSchema::primary(
                self.primary_field.clone(),
                FieldType::VarChar {
                    max_length: self.primary_max_length,
                },
            ),
            FieldSchema::new(
                self.vector_field.clone(),
                FieldType::FloatVector {
                    dim: self.dimension,
                },
            ),
        ];
        fields.extend(self.scalar_fields.iter().cloned());
        fields
    }

    /// Descriptor a store would report right after creation
    pub fn to_descriptor(&self) -> CollectionDescriptor {
        CollectionDescriptor {
            name: self.name.clone(),
            fields: self.fields(),
            indexes: vec![IndexDescriptor {
                field_name: self.vector_field.clone(),
                index_name: self.vector_field.clone(),
                index_type: self.index.index_type.name().to_string(),
                metric_type: Some(self.index.metric_type),
                params: self.index.params.clone(),
            }],
            dynamic_fields: false,
            loaded: Some(false),
            row_count: Some(0),
        }
    }
}
