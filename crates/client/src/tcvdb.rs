//! Tencent Cloud VectorDB backend (HTTP API)
//!
//! The managed store has a fixed document layout: the primary key is always
//! `id` and the vector is always `vector`. Any other field is dynamic and is
//! stored as written. Scalar fields named in a `CollectionSpec` become
//! filter indexes so they can be used in query conditions.
//!
//! Responses carry `{"code": 0, "msg": "..."}` at the top level next to
//! the payload. Writes are eventually visible unless the connection asks for
//! strong consistency.
//!
//! Searches always name their output fields: without `outputFields` the
//! store returns every stored field of each document.

use crate::backend::{BackendKind, RecordLayout, SearchRequest, VectorBackend};
use crate::connection::{ConnectOptions, Credentials, Target};
use crate::http::HttpTransport;
use annlink_core::{
    AnnError, AnnResult, CollectionDescriptor, CollectionSpec, FieldSchema, FieldType,
    FieldValue, IndexDescriptor, IndexSpec, MetricType, RecordId, SearchHit, Sidecar,
    VectorRecord,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Primary-key field name, fixed by the store
pub const ID_FIELD: &str = "id";

/// Vector field name, fixed by the store
pub const VECTOR_FIELD: &str = "vector";

/// Database used when the connection names none
pub const DEFAULT_DATABASE: &str = "default";

/// Maximum string length the store accepts for filter fields
const MAX_STRING_LEN: usize = 65535;

/// Read consistency for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadConsistency {
    /// Reads may lag recent writes
    #[default]
    EventualConsistency,
    /// Reads observe all acknowledged writes
    StrongConsistency,
}

impl ReadConsistency {
    /// Wire name
    pub fn name(&self) -> &'static str {
        match self {
            ReadConsistency::EventualConsistency => "eventualConsistency",
            ReadConsistency::StrongConsistency => "strongConsistency",
        }
    }

    /// Parse from string (`eventual` / `strong`, case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "eventual" | "eventualconsistency" => Some(ReadConsistency::EventualConsistency),
            "strong" | "strongconsistency" => Some(ReadConsistency::StrongConsistency),
            _ => None,
        }
    }
}

/// Tencent Cloud VectorDB client
pub struct TcvdbBackend {
    transport: HttpTransport,
    database: String,
    read_consistency: ReadConsistency,
}

impl TcvdbBackend {
    /// Build a backend; requires username and API key credentials
    pub fn new(
        target: &Target,
        credentials: &Credentials,
        options: &ConnectOptions,
    ) -> AnnResult<Self> {
        let (username, key) = match credentials {
            Credentials::Basic { username, secret } => (username, secret),
            other => {
                return Err(AnnError::connection(
                    target.label(),
                    format!(
                        "Tencent VectorDB requires username and API key, got {} credentials",
                        other.mode()
                    ),
                ))
            }
        };
        let authorization = format!("Bearer account={}&api_key={}", username, key);
        Ok(TcvdbBackend {
            transport: HttpTransport::new(
                &target.base_url(options.secure),
                Some(authorization),
                options.timeout,
            ),
            database: options
                .database
                .clone()
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            read_consistency: options.read_consistency,
        })
    }

    /// Database this backend operates in
    pub fn database(&self) -> &str {
        &self.database
    }

    /// POST and unwrap the status envelope; error text is returned raw
    fn call(&self, path: &str, body: Value) -> Result<Value, String> {
        let response = self
            .transport
            .post(path, &body)
            .map_err(|e| e.to_string())?;
        let code = response.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            let msg = response
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            tracing::debug!(target: "annlink::tcvdb", path, code, msg, "Request rejected");
            return Err(format!("code {}: {}", code, msg));
        }
        Ok(response)
    }

    fn admin(&self, operation: &'static str, path: &str, body: Value) -> AnnResult<Value> {
        self.call(path, body)
            .map_err(|e| AnnError::backend(operation, e))
    }

    fn scoped(&self, collection: &str) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("database".to_string(), json!(self.database));
        body.insert("collection".to_string(), json!(collection));
        body
    }

    fn list_databases(&self) -> Result<Vec<String>, String> {
        let response = self.call("/database/list", json!({}))?;
        Ok(response
            .get("databases")
            .and_then(Value::as_array)
            .map(|dbs| {
                dbs.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn ensure_database(&self) -> AnnResult<()> {
        let existing = self
            .list_databases()
            .map_err(|e| AnnError::backend("list_databases", e))?;
        if existing.iter().any(|db| db == &self.database) {
            return Ok(());
        }
        self.admin(
            "create_database",
            "/database/create",
            json!({"database": self.database}),
        )?;
        tracing::info!(target: "annlink::tcvdb", database = %self.database, "Created database");
        Ok(())
    }

    fn collection_names(&self) -> AnnResult<Vec<String>> {
        let response = self.admin(
            "list_collections",
            "/collection/list",
            json!({"database": self.database}),
        )?;
        Ok(response
            .get("collections")
            .and_then(Value::as_array)
            .map(|cs| {
                cs.iter()
                    .filter_map(|c| c.get("collection").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn describe_raw(&self, name: &str) -> AnnResult<Value> {
        let response = self
            .call("/collection/describe", Value::Object(self.scoped(name)))
            .map_err(|e| AnnError::schema(name, e))?;
        response
            .get("collection")
            .cloned()
            .ok_or_else(|| AnnError::schema(name, "collection does not exist"))
    }
}

/// Index list for a new collection
fn index_list(spec: &CollectionSpec) -> Vec<Value> {
    let mut params = Map::new();
    for (k, v) in &spec.index.params {
        params.insert(k.clone(), v.clone());
    }
    let mut indexes = vec![
        json!({"fieldName": ID_FIELD, "fieldType": "string", "indexType": "primaryKey"}),
        json!({
            "fieldName": VECTOR_FIELD,
            "fieldType": "vector",
            "indexType": spec.index.index_type.name(),
            "dimension": spec.dimension,
            "metricType": spec.index.metric_type.name(),
            "params": params,
        }),
    ];
    for field in &spec.scalar_fields {
        let field_type = match field.field_type {
            FieldType::VarChar { .. } => "string",
            FieldType::Int64 => "uint64",
            _ => continue,
        };
        indexes.push(json!({
            "fieldName": field.name,
            "fieldType": field_type,
            "indexType": "filter",
        }));
    }
    indexes
}

fn parse_descriptor(name: &str, raw: &Value) -> CollectionDescriptor {
    let mut fields = Vec::new();
    let mut indexes = Vec::new();

    for index in raw
        .get("indexes")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
    {
        let Some(field_name) = index.get("fieldName").and_then(Value::as_str) else {
            continue;
        };
        let index_type = index
            .get("indexType")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match index.get("fieldType").and_then(Value::as_str) {
            Some("vector") => {
                let dim = index
                    .get("dimension")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as usize;
                fields.push(FieldSchema::new(field_name, FieldType::FloatVector { dim }));
                let params: BTreeMap<String, Value> = index
                    .get("params")
                    .and_then(Value::as_object)
                    .map(|p| p.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                    .unwrap_or_default();
                indexes.push(IndexDescriptor {
                    field_name: field_name.to_string(),
                    index_name: field_name.to_string(),
                    index_type: index_type.to_string(),
                    metric_type: index
                        .get("metricType")
                        .and_then(Value::as_str)
                        .and_then(MetricType::parse),
                    params,
                });
            }
            Some("uint64") => fields.push(FieldSchema::new(field_name, FieldType::Int64)),
            _ => {
                let field_type = FieldType::VarChar {
                    max_length: MAX_STRING_LEN,
                };
                if index_type == "primaryKey" {
                    fields.insert(0, FieldSchema::primary(field_name, field_type));
                } else {
                    fields.push(FieldSchema::new(field_name, field_type));
                }
            }
        }
    }

    CollectionDescriptor {
        name: name.to_string(),
        fields,
        indexes,
        dynamic_fields: true,
        loaded: Some(true),
        row_count: raw.get("documentCount").and_then(Value::as_u64),
    }
}

fn document_json(record: &VectorRecord) -> Value {
    let mut doc = Map::new();
    for (k, v) in &record.sidecar {
        doc.insert(k.clone(), v.to_json());
    }
    doc.insert(ID_FIELD.to_string(), json!(record.id.as_str()));
    doc.insert(VECTOR_FIELD.to_string(), json!(record.vector));
    Value::Object(doc)
}

fn parse_document(doc: &Value, output_fields: &[String]) -> Option<SearchHit> {
    let id = doc.get(ID_FIELD).and_then(Value::as_str)?;
    let score = doc.get("score").and_then(Value::as_f64)? as f32;
    let fields: Sidecar = output_fields
        .iter()
        .filter_map(|f| {
            doc.get(f)
                .and_then(FieldValue::from_json)
                .map(|v| (f.clone(), v))
        })
        .collect();
    Some(SearchHit {
        id: RecordId::new(id),
        score,
        fields,
    })
}

impl VectorBackend for TcvdbBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Tcvdb
    }

    fn ping(&self) -> AnnResult<()> {
        self.list_databases()
            .map(|_| ())
            .map_err(|e| AnnError::connection(self.transport.base_url(), e))
    }

    fn has_collection(&self, name: &str) -> AnnResult<bool> {
        let databases = self
            .list_databases()
            .map_err(|e| AnnError::backend("list_databases", e))?;
        if !databases.iter().any(|db| db == &self.database) {
            return Ok(false);
        }
        Ok(self.collection_names()?.iter().any(|c| c == name))
    }

    fn describe_collection(&self, name: &str) -> AnnResult<CollectionDescriptor> {
        let raw = self.describe_raw(name)?;
        Ok(parse_descriptor(name, &raw))
    }

    fn create_collection(&self, spec: &CollectionSpec) -> AnnResult<()> {
        if spec.primary_field != ID_FIELD || spec.vector_field != VECTOR_FIELD {
            tracing::debug!(
                target: "annlink::tcvdb",
                collection = %spec.name,
                primary = %spec.primary_field,
                vector = %spec.vector_field,
                "Field names are fixed by the store, using 'id' and 'vector'"
            );
        }
        self.ensure_database()?;

        let mut body = self.scoped(&spec.name);
        body.insert("shardNum".to_string(), json!(spec.shards));
        body.insert("replicaNum".to_string(), json!(spec.replicas));
        body.insert("description".to_string(), json!(spec.description));
        body.insert("indexes".to_string(), json!(index_list(spec)));
        self.admin("create_collection", "/collection/create", Value::Object(body))?;
        Ok(())
    }

    fn drop_collection(&self, name: &str) -> AnnResult<()> {
        self.admin(
            "drop_collection",
            "/collection/drop",
            Value::Object(self.scoped(name)),
        )?;
        Ok(())
    }

    fn truncate_collection(&self, name: &str) -> AnnResult<()> {
        let response = self.admin(
            "truncate_collection",
            "/collection/truncate",
            Value::Object(self.scoped(name)),
        )?;
        tracing::debug!(
            target: "annlink::tcvdb",
            collection = name,
            removed = response.get("affectedCount").and_then(serde_json::Value::as_u64),
            "Truncated collection"
        );
        Ok(())
    }

    fn create_index(&self, _name: &str, _field: &str, _index: &IndexSpec) -> AnnResult<()> {
        Err(AnnError::backend(
            "create_index",
            "Tencent VectorDB fixes indexes at collection creation; \
             recreate the collection instead",
        ))
    }

    fn rebuild_index(&self, name: &str) -> AnnResult<()> {
        let mut body = self.scoped(name);
        body.insert("dropBeforeRebuild".to_string(), json!(false));
        body.insert("throttle".to_string(), json!(1));
        self.admin("rebuild_index", "/index/rebuild", Value::Object(body))?;
        tracing::info!(target: "annlink::tcvdb", collection = name, "Index rebuild started");
        Ok(())
    }

    fn upsert(
        &self,
        name: &str,
        layout: &RecordLayout,
        records: &[VectorRecord],
    ) -> AnnResult<usize> {
        if layout.primary_field != ID_FIELD || layout.vector_field != VECTOR_FIELD {
            return Err(AnnError::insert(
                name,
                format!(
                    "layout ({}, {}) does not match the fixed ({}, {}) fields",
                    layout.primary_field, layout.vector_field, ID_FIELD, VECTOR_FIELD
                ),
            ));
        }
        let documents: Vec<Value> = records.iter().map(document_json).collect();
        let mut body = self.scoped(name);
        body.insert("buildIndex".to_string(), json!(true));
        body.insert("documents".to_string(), json!(documents));
        let response = self
            .call("/document/upsert", Value::Object(body))
            .map_err(|e| AnnError::insert(name, e))?;
        let count = response
            .get("affectedCount")
            .and_then(Value::as_u64)
            .ok_or_else(|| AnnError::insert(name, "response is missing affectedCount"))?;
        Ok(count as usize)
    }

    fn search(&self, name: &str, request: &SearchRequest<'_>) -> AnnResult<Vec<SearchHit>> {
        if request.anns_field != VECTOR_FIELD {
            return Err(AnnError::search(
                name,
                format!("'{}' is not the indexed vector field", request.anns_field),
            ));
        }
        let mut fields = vec![ID_FIELD];
        fields.extend(
            request
                .output_fields
                .iter()
                .map(String::as_str)
                .filter(|f| *f != ID_FIELD),
        );

        let mut search = Map::new();
        search.insert("vectors".to_string(), json!([request.vector]));
        search.insert("limit".to_string(), json!(request.limit));
        search.insert("retrieveVector".to_string(), json!(false));
        search.insert("params".to_string(), json!(request.index.search_params));
        search.insert("outputFields".to_string(), json!(fields));
        if let Some(filter) = request.filter {
            search.insert("filter".to_string(), json!(filter));
        }

        let mut body = self.scoped(name);
        body.insert(
            "readConsistency".to_string(),
            json!(self.read_consistency.name()),
        );
        body.insert("search".to_string(), Value::Object(search));

        let response = self
            .call("/document/search", Value::Object(body))
            .map_err(|e| AnnError::search(name, e))?;

        // One result list per query vector; we always send exactly one
        let docs = response
            .get("documents")
            .and_then(Value::as_array)
            .and_then(|lists| lists.first())
            .and_then(Value::as_array)
            .ok_or_else(|| AnnError::search(name, "response is missing documents"))?;
        docs.iter()
            .map(|doc| {
                parse_document(doc, request.output_fields)
                    .ok_or_else(|| AnnError::search(name, format!("malformed document: {}", doc)))
            })
            .collect()
    }

    fn delete(&self, name: &str, ids: &[RecordId]) -> AnnResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<&str> = ids.iter().map(RecordId::as_str).collect();
        let mut body = self.scoped(name);
        body.insert("query".to_string(), json!({"documentIds": ids}));
        let response = self.admin("delete", "/document/delete", Value::Object(body))?;
        Ok(response
            .get("affectedCount")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(ids.len()))
    }

    fn count(&self, name: &str) -> AnnResult<u64> {
        let raw = self.describe_raw(name)?;
        Ok(raw.get("documentCount").and_then(Value::as_u64).unwrap_or(0))
    }
}
