//! Record and hit types
//!
//! A `VectorRecord` is what the Upsert client submits; a `SearchHit` is what
//! the Search client returns. Both carry sidecar fields: scalar values stored
//! next to the vector and used for filtering or display.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Record identifier (primary key in the remote collection)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap an existing key
    pub fn new(id: impl Into<String>) -> Self {
        RecordId(id.into())
    }

    /// Generate a fresh random identifier (UUID v4, hyphenated)
    pub fn random() -> Self {
        RecordId(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the owned string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId(s)
    }
}

/// Scalar value of a sidecar field
///
/// Only scalars are stored next to vectors. Arrays and objects are not
/// supported by either remote store's filter indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
}

impl FieldValue {
    /// Convert from a JSON value, rejecting arrays and objects
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(FieldValue::Null),
            serde_json::Value::Bool(b) => Some(FieldValue::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(FieldValue::Int)
                .or_else(|| n.as_f64().map(FieldValue::Float)),
            serde_json::Value::String(s) => Some(FieldValue::String(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// Convert into a JSON value for request bodies
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Int(i) => serde_json::Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::String(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// String contents, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// Sidecar fields, ordered by name for deterministic request bodies
pub type Sidecar = BTreeMap<String, FieldValue>;

/// Build a sidecar holding a single `path` field
pub fn path_sidecar(path: impl AsRef<Path>) -> Sidecar {
    let mut sidecar = Sidecar::new();
    sidecar.insert(
        "path".to_string(),
        FieldValue::String(path.as_ref().to_string_lossy().into_owned()),
    );
    sidecar
}

/// A vector record as submitted to the store
///
/// Records are never mutated after construction. Re-upserting the same id
/// replaces the stored record as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Primary key
    pub id: RecordId,
    /// Embedding vector
    pub vector: Vec<f32>,
    /// Scalar fields stored next to the vector
    #[serde(default)]
    pub sidecar: Sidecar,
}

impl VectorRecord {
    /// Create a record with an explicit id
    pub fn new(id: RecordId, vector: Vec<f32>, sidecar: Sidecar) -> Self {
        VectorRecord {
            id,
            vector,
            sidecar,
        }
    }

    /// Create a record with a freshly generated id
    pub fn with_random_id(vector: Vec<f32>, sidecar: Sidecar) -> Self {
        VectorRecord::new(RecordId::random(), vector, sidecar)
    }

    /// Vector dimensionality
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// One nearest-neighbor result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Primary key of the matched record
    pub id: RecordId,
    /// Store-native score (distance for L2, similarity for IP/COSINE)
    pub score: f32,
    /// Requested output fields only
    #[serde(default)]
    pub fields: Sidecar,
}

impl SearchHit {
    /// Create a hit without output fields
    pub fn new(id: RecordId, score: f32) -> Self {
        SearchHit {
            id,
            score,
            fields: Sidecar::new(),
        }
    }

    /// Look up a requested output field
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Resolve a stored path field to its absolute filesystem form
    ///
    /// Existing files are canonicalized (symlinks resolved). Paths that do
    /// not exist locally are joined onto the current directory. Returns
    /// `None` if the field was not requested or is not a string.
    pub fn resolved_path(&self, field: &str) -> Option<PathBuf> {
        let raw = self.field(field)?.as_str()?;
        Some(absolute_path(Path::new(raw)))
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
