//! Milvus backend (RESTful API v2)
//!
//! Every call is a JSON POST to `/v2/vectordb/<resource>/<action>` and every
//! response is wrapped in an envelope:
//!
//! ```text
//! {"code": 0, "message": "...", "data": ...}
//! ```
//!
//! A non-zero `code` is a store-side failure; the message is passed through
//! in the mapped `AnnError`.
//!
//! Loading is asynchronous on the server: `collections/load` only schedules
//! it, so `load_collection` polls `get_load_state` until the collection is
//! queryable or the connection timeout runs out.

use crate::backend::{BackendKind, RecordLayout, SearchRequest, VectorBackend};
use crate::connection::{ConnectOptions, Credentials, Target};
use crate::http::{HttpError, HttpTransport};
use annlink_core::{
    AnnError, AnnResult, CollectionDescriptor, CollectionSpec, FieldSchema, FieldType,
    FieldValue, IndexDescriptor, IndexSpec, MetricType, RecordId, SearchHit, Sidecar,
    VectorRecord,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

const API_PREFIX: &str = "/v2/vectordb";

/// Pause between load-state checks
const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Index description keys that are not build params
const NON_BUILD_KEYS: [&str; 3] = ["index_type", "metric_type", "params"];

/// Field name Milvus uses for the score of each hit
const DISTANCE_FIELD: &str = "distance";

/// Failure of one REST call, before mapping onto `AnnError`
#[derive(Debug)]
enum CallError {
    Http(HttpError),
    Api { code: i64, message: String },
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::Http(e) => write!(f, "{}", e),
            CallError::Api { code, message } => write!(f, "code {}: {}", code, message),
        }
    }
}

/// Milvus REST v2 client
pub struct MilvusBackend {
    transport: HttpTransport,
    database: Option<String>,
    load_timeout: Duration,
}

impl MilvusBackend {
    /// Build a backend for a target; no request is sent until `ping`
    pub fn new(target: &Target, credentials: &Credentials, options: &ConnectOptions) -> Self {
        let secure = options.secure || matches!(credentials, Credentials::Token { .. });
        let mut base_url = target.base_url(secure);
        if secure {
            if let Some(rest) = base_url.strip_prefix("http://") {
                base_url = format!("https://{}", rest);
            }
        }
        let authorization = match credentials {
            Credentials::None => None,
            Credentials::Basic { username, secret } => {
                Some(format!("Bearer {}:{}", username, secret))
            }
            Credentials::Token { token } => Some(format!("Bearer {}", token)),
        };
        MilvusBackend {
            transport: HttpTransport::new(&base_url, authorization, options.timeout),
            database: options.database.clone(),
            load_timeout: options.timeout,
        }
    }

    /// Base URL requests go to
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    fn call(&self, endpoint: &str, mut body: Value) -> Result<Value, CallError> {
        if let (Some(db), Some(obj)) = (&self.database, body.as_object_mut()) {
            obj.insert("dbName".to_string(), json!(db));
        }
        let path = format!("{}/{}", API_PREFIX, endpoint);
        let response = self.transport.post(&path, &body).map_err(CallError::Http)?;

        let code = response.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            let message = response
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            tracing::debug!(
                target: "annlink::milvus",
                endpoint,
                code,
                %message,
                "Request rejected"
            );
            return Err(CallError::Api { code, message });
        }
        Ok(response.get("data").cloned().unwrap_or(Value::Null))
    }

    fn admin(&self, operation: &'static str, endpoint: &str, body: Value) -> AnnResult<Value> {
        self.call(endpoint, body)
            .map_err(|e| AnnError::backend(operation, e.to_string()))
    }

    fn index_details(&self, collection: &str, index_name: &str) -> AnnResult<Option<Value>> {
        let data = self.admin(
            "describe_index",
            "indexes/describe",
            json!({"collectionName": collection, "indexName": index_name}),
        )?;
        Ok(data.as_array().and_then(|a| a.first()).cloned())
    }

    fn load_state(&self, collection: &str) -> AnnResult<bool> {
        let data = self.admin(
            "get_load_state",
            "collections/get_load_state",
            json!({"collectionName": collection}),
        )?;
        Ok(data.get("loadState").and_then(Value::as_str) == Some("LoadStateLoaded"))
    }
}

/// Parse a Milvus schema field into a `FieldSchema`
///
/// Returns `None` for types annlink does not model (arrays, sparse and
/// half-precision vectors).
fn parse_field(field: &Value) -> Option<FieldSchema> {
    let name = field.get("name").and_then(Value::as_str)?;
    let type_name = field.get("type").and_then(Value::as_str)?;
    let params = field_params(field);
    let param = |key: &str| params.get(key).copied().unwrap_or(0);

    let field_type = match type_name {
        "Bool" => FieldType::Bool,
        "Int8" | "Int16" | "Int32" | "Int64" => FieldType::Int64,
        "Float" => FieldType::Float,
        "Double" => FieldType::Double,
        "VarChar" | "String" => FieldType::VarChar {
            max_length: param("max_length"),
        },
        "JSON" => FieldType::Json,
        "FloatVector" => FieldType::FloatVector { dim: param("dim") },
        "BinaryVector" => FieldType::BinaryVector { dim: param("dim") },
        other => {
            tracing::debug!(
                target: "annlink::milvus",
                field = name,
                field_type = other,
                "Skipping unsupported field type"
            );
            return None;
        }
    };

    let is_primary = field
        .get("primaryKey")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Some(FieldSchema {
        name: name.to_string(),
        field_type,
        is_primary,
    })
}

/// Build params of an index description
///
/// Milvus reports them either as an object or as a `[{"key", "value"}]`
/// list whose values are strings; a `params` entry holding a JSON object
/// string is flattened. Numeric strings become numbers.
fn index_build_params(details: &Value) -> BTreeMap<String, Value> {
    fn typed(value: &Value) -> Value {
        match value {
            Value::String(s) => serde_json::from_str::<Value>(s)
                .ok()
                .filter(Value::is_number)
                .unwrap_or_else(|| value.clone()),
            other => other.clone(),
        }
    }

    let mut out = BTreeMap::new();
    let mut add = |key: &str, value: &Value| {
        if key == "params" {
            let nested = match value {
                Value::String(s) => serde_json::from_str::<Value>(s).ok(),
                other => Some(other.clone()),
            };
            if let Some(Value::Object(nested)) = nested {
                for (k, v) in &nested {
                    if !NON_BUILD_KEYS.contains(&k.as_str()) {
                        out.insert(k.clone(), typed(v));
                    }
                }
            }
        } else if !NON_BUILD_KEYS.contains(&key) {
            out.insert(key.to_string(), typed(value));
        }
    };

    match details.get("params") {
        Some(Value::Object(params)) => {
            for (k, v) in params {
                add(k, v);
            }
        }
        Some(Value::Array(params)) => {
            for p in params {
                let key = p.get("key").and_then(Value::as_str);
                if let (Some(k), Some(v)) = (key, p.get("value")) {
                    add(k, v);
                }
            }
        }
        Some(other) => add("params", other),
        None => {}
    }
    out
}

/// Numeric type params; Milvus reports them as `[{"key": .., "value": ".."}]`
fn field_params(field: &Value) -> BTreeMap<&str, usize> {
    let mut out = BTreeMap::new();
    if let Some(params) = field.get("params").and_then(Value::as_array) {
        for p in params {
            let key = p.get("key").and_then(Value::as_str);
            let value = p.get("value").and_then(|v| match v {
                Value::String(s) => s.parse::<usize>().ok(),
                Value::Number(n) => n.as_u64().map(|n| n as usize),
                _ => None,
            });
            if let (Some(k), Some(v)) = (key, value) {
                out.insert(k, v);
            }
        }
    }
    out
}

fn data_type(field_type: &FieldType) -> (&'static str, Option<Value>) {
    match field_type {
        FieldType::Bool => ("Bool", None),
        FieldType::Int64 => ("Int64", None),
        FieldType::Float => ("Float", None),
        FieldType::Double => ("Double", None),
        FieldType::VarChar { max_length } => {
            ("VarChar", Some(json!({"max_length": max_length})))
        }
        FieldType::Json => ("JSON", None),
        FieldType::FloatVector { dim } => ("FloatVector", Some(json!({"dim": dim}))),
        FieldType::BinaryVector { dim } => ("BinaryVector", Some(json!({"dim": dim}))),
    }
}

fn field_json(field: &FieldSchema) -> Value {
    let (type_name, params) = data_type(&field.field_type);
    let mut obj = Map::new();
    obj.insert("fieldName".to_string(), json!(field.name));
    obj.insert("dataType".to_string(), json!(type_name));
    if field.is_primary {
        obj.insert("isPrimary".to_string(), json!(true));
    }
    if let Some(params) = params {
        obj.insert("elementTypeParams".to_string(), params);
    }
    Value::Object(obj)
}

fn index_params_json(field: &str, index: &IndexSpec) -> Value {
    let mut params = Map::new();
    params.insert("index_type".to_string(), json!(index.index_type.name()));
    for (k, v) in &index.params {
        params.insert(k.clone(), v.clone());
    }
    json!({
        "fieldName": field,
        "indexName": field,
        "metricType": index.metric_type.name(),
        "params": params,
    })
}

fn row_json(layout: &RecordLayout, record: &VectorRecord) -> Value {
    let mut row = Map::new();
    for (k, v) in &record.sidecar {
        row.insert(k.clone(), v.to_json());
    }
    row.insert(layout.primary_field.clone(), json!(record.id.as_str()));
    row.insert(layout.vector_field.clone(), json!(record.vector));
    Value::Object(row)
}

fn parse_hit(hit: &Value, request: &SearchRequest<'_>) -> Option<SearchHit> {
    let id = match hit.get(request.primary_field)? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let score = hit.get(DISTANCE_FIELD).and_then(Value::as_f64)? as f32;
    let fields: Sidecar = request
        .output_fields
        .iter()
        .filter_map(|f| {
            hit.get(f)
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

/// Render ids as a Milvus boolean filter expression on the primary key
fn id_filter(primary_field: &str, ids: &[RecordId]) -> AnnResult<String> {
    let quoted = ids
        .iter()
        .map(|id| serde_json::to_string(id.as_str()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AnnError::invalid_input(format!("Unencodable record id: {}", e)))?;
    Ok(format!("{} in [{}]", primary_field, quoted.join(",")))
}

impl VectorBackend for MilvusBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Milvus
    }

    fn ping(&self) -> AnnResult<()> {
        self.call("collections/list", json!({}))
            .map(|_| ())
            .map_err(|e| AnnError::connection(self.transport.base_url(), e.to_string()))
    }

    fn has_collection(&self, name: &str) -> AnnResult<bool> {
        let data = self.admin(
            "has_collection",
            "collections/has",
            json!({"collectionName": name}),
        )?;
        Ok(data.get("has").and_then(Value::as_bool).unwrap_or(false))
    }

    fn describe_collection(&self, name: &str) -> AnnResult<CollectionDescriptor> {
        let data = self
            .call("collections/describe", json!({"collectionName": name}))
            .map_err(|e| match e {
                CallError::Api { message, .. } => AnnError::schema(name, message),
                CallError::Http(e) => AnnError::backend("describe_collection", e.to_string()),
            })?;

        let fields: Vec<FieldSchema> = data
            .get("fields")
            .and_then(Value::as_array)
            .map(|fs| fs.iter().filter_map(parse_field).collect())
            .unwrap_or_default();

        let mut indexes = Vec::new();
        if let Some(reported) = data.get("indexes").and_then(Value::as_array) {
            for index in reported {
                let field_name = index
                    .get("fieldName")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let index_name = index
                    .get("indexName")
                    .and_then(Value::as_str)
                    .unwrap_or(&field_name)
                    .to_string();
                let mut metric_type = index
                    .get("metricType")
                    .and_then(Value::as_str)
                    .and_then(MetricType::parse);

                // The collection summary omits the index type; ask the index itself
                let details = self.index_details(name, &index_name)?;
                let index_type = details
                    .as_ref()
                    .and_then(|d| d.get("indexType"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if metric_type.is_none() {
                    metric_type = details
                        .as_ref()
                        .and_then(|d| d.get("metricType"))
                        .and_then(Value::as_str)
                        .and_then(MetricType::parse);
                }
                let params = details.as_ref().map(index_build_params).unwrap_or_default();

                indexes.push(IndexDescriptor {
                    field_name,
                    index_name,
                    index_type,
                    metric_type,
                    params,
                });
            }
        }

        let loaded = data
            .get("load")
            .and_then(Value::as_str)
            .map(|s| s == "LoadStateLoaded");

        Ok(CollectionDescriptor {
            name: name.to_string(),
            fields,
            indexes,
            dynamic_fields: data
                .get("enableDynamicField")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            loaded,
            row_count: None,
        })
    }

    fn create_collection(&self, spec: &CollectionSpec) -> AnnResult<()> {
        let fields: Vec<Value> = spec.fields().iter().map(field_json).collect();
        let body = json!({
            "collectionName": spec.name,
            "description": spec.description,
            "schema": {
                "autoId": false,
                "enableDynamicField": false,
                "fields": fields,
            },
            "indexParams": [index_params_json(&spec.vector_field, &spec.index)],
            "params": {"shardsNum": spec.shards},
        });
        self.admin("create_collection", "collections/create", body)?;
        Ok(())
    }

    fn drop_collection(&self, name: &str) -> AnnResult<()> {
        self.admin(
            "drop_collection",
            "collections/drop",
            json!({"collectionName": name}),
        )?;
        Ok(())
    }

    fn truncate_collection(&self, name: &str) -> AnnResult<()> {
        let descriptor = self.describe_collection(name)?;
        let primary = descriptor
            .primary_field()
            .ok_or_else(|| AnnError::schema(name, "collection has no primary key"))?;
        // Matches every row; deleting by expression needs a loaded collection
        let filter = match primary.field_type {
            FieldType::Int64 => format!("{0} >= 0 or {0} < 0", primary.name),
            _ => format!("{} != \"\"", primary.name),
        };
        self.load_collection(name)?;
        self.admin(
            "truncate_collection",
            "entities/delete",
            json!({"collectionName": name, "filter": filter}),
        )?;
        Ok(())
    }

    fn create_index(&self, name: &str, field: &str, index: &IndexSpec) -> AnnResult<()> {
        self.admin(
            "create_index",
            "indexes/create",
            json!({
                "collectionName": name,
                "indexParams": [index_params_json(field, index)],
            }),
        )?;
        Ok(())
    }

    fn rebuild_index(&self, name: &str) -> AnnResult<()> {
        let descriptor = self.describe_collection(name)?;
        let index = descriptor
            .first_index()
            .ok_or_else(|| AnnError::schema(name, "collection has no index to rebuild"))?;
        let index_type = annlink_core::IndexType::parse(&index.index_type).ok_or_else(|| {
            AnnError::backend(
                "rebuild_index",
                format!("cannot rebuild index of type '{}'", index.index_type),
            )
        })?;
        let metric_type = index.metric_type.unwrap_or_default();
        if index.params.is_empty() {
            tracing::warn!(
                target: "annlink::milvus",
                collection = name,
                index_type = %index_type,
                "Index reports no build params, rebuilding with server defaults"
            );
        }

        // An index cannot be dropped while the collection is loaded
        self.admin(
            "release_collection",
            "collections/release",
            json!({"collectionName": name}),
        )?;
        self.admin(
            "drop_index",
            "indexes/drop",
            json!({"collectionName": name, "indexName": index.index_name}),
        )?;

        let spec = IndexSpec {
            index_type,
            metric_type,
            params: index.params.clone(),
        };
        self.create_index(name, &index.field_name, &spec)?;
        tracing::info!(
            target: "annlink::milvus",
            collection = name,
            index_type = %index_type,
            "Rebuilt index"
        );
        Ok(())
    }

    fn requires_load(&self) -> bool {
        true
    }

    fn load_collection(&self, name: &str) -> AnnResult<()> {
        if self.load_state(name)? {
            return Ok(());
        }
        self.admin(
            "load_collection",
            "collections/load",
            json!({"collectionName": name}),
        )?;

        let deadline = Instant::now() + self.load_timeout;
        loop {
            if self.load_state(name)? {
                tracing::debug!(target: "annlink::milvus", collection = name, "Collection loaded");
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(AnnError::backend(
                    "load_collection",
                    format!(
                        "'{}' still loading after {} ms",
                        name,
                        self.load_timeout.as_millis()
                    ),
                ));
            }
            thread::sleep(LOAD_POLL_INTERVAL.min(deadline - now));
        }
    }

    fn upsert(
        &self,
        name: &str,
        layout: &RecordLayout,
        records: &[VectorRecord],
    ) -> AnnResult<usize> {
        let rows: Vec<Value> = records.iter().map(|r| row_json(layout, r)).collect();
        let data = self
            .call(
                "entities/upsert",
                json!({"collectionName": name, "data": rows}),
            )
            .map_err(|e| AnnError::insert(name, e.to_string()))?;
        let count = data
            .get("upsertCount")
            .and_then(Value::as_u64)
            .ok_or_else(|| AnnError::insert(name, "response is missing upsertCount"))?;
        Ok(count as usize)
    }

    fn search(&self, name: &str, request: &SearchRequest<'_>) -> AnnResult<Vec<SearchHit>> {
        let mut body = json!({
            "collectionName": name,
            "data": [request.vector],
            "annsField": request.anns_field,
            "limit": request.limit,
            "outputFields": request.output_fields,
            "searchParams": {
                "metricType": request.index.metric_type.name(),
                "params": request.index.search_params,
            },
        });
        if let Some(filter) = request.filter {
            body["filter"] = json!(filter);
        }
        let data = self
            .call("entities/search", body)
            .map_err(|e| AnnError::search(name, e.to_string()))?;

        let rows = data
            .as_array()
            .ok_or_else(|| AnnError::search(name, "response data is not a list"))?;
        rows.iter()
            .map(|row| {
                parse_hit(row, request)
                    .ok_or_else(|| AnnError::search(name, format!("malformed hit: {}", row)))
            })
            .collect()
    }

    fn delete(&self, name: &str, ids: &[RecordId]) -> AnnResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let descriptor = self.describe_collection(name)?;
        let primary = descriptor
            .primary_field()
            .ok_or_else(|| AnnError::schema(name, "collection has no primary key"))?;
        let filter = id_filter(&primary.name, ids)?;
        let data = self.admin(
            "delete",
            "entities/delete",
            json!({"collectionName": name, "filter": filter}),
        )?;
        Ok(data
            .get("deleteCount")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(ids.len()))
    }

    fn count(&self, name: &str) -> AnnResult<u64> {
        let data = self.admin(
            "count",
            "collections/get_stats",
            json!({"collectionName": name}),
        )?;
        Ok(data.get("rowCount").and_then(Value::as_u64).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::fake::FakeStore;
    use annlink_core::{ErrorKind, IndexConfig, IndexType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ok(data: Value) -> Value {
        json!({"code": 0, "data": data})
    }

    fn connect(store: &FakeStore, timeout: Duration) -> MilvusBackend {
        MilvusBackend::new(
            &Target::uri(store.url()),
            &Credentials::None,
            &ConnectOptions::default().with_timeout(timeout),
        )
    }

    /// Answers describe calls for an `images` collection with an IVF_FLAT index
    fn describe_images(path: &str) -> Option<Value> {
        if path.ends_with("/collections/describe") {
            Some(ok(json!({
                "collectionName": "images",
                "fields": [
                    {"name": "id", "type": "VarChar", "primaryKey": true,
                     "params": [{"key": "max_length", "value": "64"}]},
                    {"name": "embedding", "type": "FloatVector",
                     "params": [{"key": "dim", "value": "2"}]},
                ],
                "indexes": [{"fieldName": "embedding", "indexName": "embedding",
                             "metricType": "L2"}],
                "load": "LoadStateLoaded",
            })))
        } else if path.ends_with("/indexes/describe") {
            Some(ok(json!([{
                "fieldName": "embedding",
                "indexName": "embedding",
                "indexType": "IVF_FLAT",
                "metricType": "L2",
                "params": [
                    {"key": "index_type", "value": "IVF_FLAT"},
                    {"key": "metric_type", "value": "L2"},
                    {"key": "params", "value": "{\"nlist\":\"128\"}"},
                ],
            }])))
        } else {
            None
        }
    }

    #[test]
    fn test_parse_field_reads_params() {
        let field = json!({
            "name": "embedding",
            "type": "FloatVector",
            "params": [{"key": "dim", "value": "2048"}],
        });
        let parsed = parse_field(&field).unwrap();
        assert_eq!(parsed.field_type, FieldType::FloatVector { dim: 2048 });
        assert!(!parsed.is_primary);

        let pk = json!({
            "name": "id",
            "type": "VarChar",
            "primaryKey": true,
            "params": [{"key": "max_length", "value": 64}],
        });
        let parsed = parse_field(&pk).unwrap();
        assert_eq!(parsed.field_type, FieldType::VarChar { max_length: 64 });
        assert!(parsed.is_primary);
    }

    #[test]
    fn test_parse_field_skips_unsupported() {
        let field = json!({"name": "tags", "type": "Array"});
        assert!(parse_field(&field).is_none());
    }

    #[test]
    fn test_field_json_shape() {
        let f = FieldSchema::primary("id", FieldType::VarChar { max_length: 64 });
        assert_eq!(
            field_json(&f),
            json!({
                "fieldName": "id",
                "dataType": "VarChar",
                "isPrimary": true,
                "elementTypeParams": {"max_length": 64},
            })
        );
    }

    #[test]
    fn test_index_params_shape() {
        let v = index_params_json("embedding", &IndexSpec::ivf_flat(2048));
        assert_eq!(v["metricType"], "L2");
        assert_eq!(v["params"]["index_type"], "IVF_FLAT");
        assert_eq!(v["params"]["nlist"], 2048);
    }

    #[test]
    fn test_row_json_uses_layout() {
        let layout = RecordLayout::new("pk", "vec");
        let record = VectorRecord::new(
            RecordId::new("a"),
            vec![0.5, 1.0],
            annlink_core::path_sidecar("a.jpg"),
        );
        let row = row_json(&layout, &record);
        assert_eq!(row["pk"], "a");
        assert_eq!(row["vec"], json!([0.5, 1.0]));
        assert_eq!(row["path"], "a.jpg");
    }

    #[test]
    fn test_parse_hit() {
        let index = IndexConfig::for_index(IndexType::IvfFlat, MetricType::L2);
        let output = vec!["path".to_string()];
        let request = SearchRequest {
            primary_field: "id",
            anns_field: "embedding",
            vector: &[0.0],
            limit: 1,
            index: &index,
            output_fields: &output,
            filter: None,
        };
        let hit = parse_hit(&json!({"id": "a", "distance": 0.25, "path": "a.jpg"}), &request)
            .unwrap();
        assert_eq!(hit.id.as_str(), "a");
        assert_eq!(hit.score, 0.25);
        assert_eq!(hit.field("path").and_then(|v| v.as_str()), Some("a.jpg"));

        assert!(parse_hit(&json!({"distance": 0.1}), &request).is_none());
    }

    #[test]
    fn test_id_filter_quotes_ids() {
        let ids = vec![RecordId::new("a"), RecordId::new("b\"c")];
        assert_eq!(id_filter("id", &ids).unwrap(), r#"id in ["a","b\"c"]"#);
    }

    #[test]
    fn test_token_forces_https() {
        let backend = MilvusBackend::new(
            &Target::uri("in01.cloud.example.com:19530"),
            &Credentials::token("t"),
            &ConnectOptions::default(),
        );
        assert_eq!(backend.base_url(), "https://in01.cloud.example.com:19530");

        let plain = MilvusBackend::new(
            &Target::host_port("localhost", 19530),
            &Credentials::None,
            &ConnectOptions::default(),
        );
        assert_eq!(plain.base_url(), "http://localhost:19530");
    }

    #[test]
    fn test_index_build_params_shapes() {
        let listed = json!({"params": [
            {"key": "index_type", "value": "HNSW"},
            {"key": "M", "value": "16"},
            {"key": "efConstruction", "value": "200"},
        ]});
        let params = index_build_params(&listed);
        assert_eq!(params.get("M"), Some(&json!(16)));
        assert_eq!(params.get("efConstruction"), Some(&json!(200)));
        assert!(!params.contains_key("index_type"));

        let object = json!({"params": {"nlist": 1024, "metric_type": "IP"}});
        let params = index_build_params(&object);
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("nlist"), Some(&json!(1024)));

        assert!(index_build_params(&json!({"indexType": "FLAT"})).is_empty());
    }

    #[test]
    fn test_load_polls_until_loaded() {
        let checks = Arc::new(AtomicUsize::new(0));
        let seen = checks.clone();
        let store = FakeStore::start(move |path, _| {
            if path.ends_with("/get_load_state") {
                let n = seen.fetch_add(1, Ordering::SeqCst);
                let state = if n < 3 { "LoadStateLoading" } else { "LoadStateLoaded" };
                ok(json!({"loadState": state}))
            } else {
                ok(json!({}))
            }
        });
        let backend = connect(&store, Duration::from_secs(5));
        backend.load_collection("images").unwrap();

        let received = store.received();
        assert_eq!(received.count("/collections/load"), 1);
        assert_eq!(received.count("/get_load_state"), 4);
        assert_eq!(checks.load(Ordering::SeqCst), 4);
        assert!(received.paths().last().unwrap().ends_with("/get_load_state"));
    }

    #[test]
    fn test_load_gives_up_at_timeout() {
        let store = FakeStore::start(|path, _| {
            if path.ends_with("/get_load_state") {
                ok(json!({"loadState": "LoadStateLoading"}))
            } else {
                ok(json!({}))
            }
        });
        let backend = connect(&store, Duration::from_millis(300));
        let started = Instant::now();
        let err = backend.load_collection("images").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(store.received().count("/get_load_state") >= 2);
    }

    #[test]
    fn test_upsert_reads_confirmed_count() {
        let store = FakeStore::start(|_, body| {
            let n = body["data"].as_array().map(Vec::len).unwrap_or(0);
            ok(json!({"upsertCount": n - 1, "upsertIds": ["a"]}))
        });
        let backend = connect(&store, Duration::from_secs(5));
        let records = vec![
            VectorRecord::new(RecordId::new("a"), vec![0.5, 1.0], Sidecar::new()),
            VectorRecord::new(RecordId::new("b"), vec![1.0, 0.5], Sidecar::new()),
        ];
        let count = backend
            .upsert("images", &RecordLayout::new("id", "embedding"), &records)
            .unwrap();
        assert_eq!(count, 1);

        let body = store.received().body("/entities/upsert").unwrap();
        assert_eq!(body["collectionName"], "images");
        assert_eq!(body["data"][1]["id"], "b");
        assert_eq!(body["data"][1]["embedding"], json!([1.0, 0.5]));
    }

    #[test]
    fn test_upsert_without_count_is_insert_error() {
        let store = FakeStore::start(|_, _| ok(json!({"upsertIds": ["a"]})));
        let backend = connect(&store, Duration::from_secs(5));
        let record = VectorRecord::new(RecordId::new("a"), vec![0.5], Sidecar::new());
        let err = backend
            .upsert("images", &RecordLayout::new("id", "embedding"), &[record])
            .unwrap_err();
        assert!(err.is_insert());
        assert!(err.to_string().contains("upsertCount"));
    }

    #[test]
    fn test_error_code_maps_per_operation() {
        let store = FakeStore::start(|_, _| {
            json!({"code": 1100, "message": "collection not found[collection=images]"})
        });
        let backend = connect(&store, Duration::from_secs(5));
        let layout = RecordLayout::new("id", "embedding");
        let record = VectorRecord::new(RecordId::new("a"), vec![0.5], Sidecar::new());

        let err = backend.upsert("images", &layout, &[record]).unwrap_err();
        assert!(err.is_insert());
        assert!(err.to_string().contains("code 1100: collection not found"));

        assert!(backend.describe_collection("images").unwrap_err().is_schema());
        let err = backend.has_collection("images").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(backend.ping().unwrap_err().is_connection());
    }

    #[test]
    fn test_search_sends_filter_and_parses_hits() {
        let store = FakeStore::start(|_, _| {
            ok(json!([
                {"id": "b", "distance": 0.5, "path": "b.jpg"},
                {"id": "a", "distance": 0.75, "path": "a.jpg"},
            ]))
        });
        let backend = connect(&store, Duration::from_secs(5));
        let index = IndexConfig::for_index(IndexType::IvfFlat, MetricType::L2);
        let output = vec!["path".to_string()];
        let request = SearchRequest {
            primary_field: "id",
            anns_field: "embedding",
            vector: &[0.0, 1.0],
            limit: 2,
            index: &index,
            output_fields: &output,
            filter: Some(r#"path like "%.jpg""#),
        };
        let hits = backend.search("images", &request).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(hits[1].field("path").and_then(|v| v.as_str()), Some("a.jpg"));

        let body = store.received().body("/entities/search").unwrap();
        assert_eq!(body["filter"], r#"path like "%.jpg""#);
        assert_eq!(body["annsField"], "embedding");
        assert_eq!(body["limit"], 2);
        assert_eq!(body["data"], json!([[0.0, 1.0]]));
        assert_eq!(body["searchParams"]["metricType"], "L2");
        assert_eq!(body["searchParams"]["params"]["nprobe"], 10);
        assert_eq!(body["outputFields"], json!(["path"]));
    }

    #[test]
    fn test_search_without_filter_omits_it() {
        let store = FakeStore::start(|_, _| ok(json!({"unexpected": true})));
        let backend = connect(&store, Duration::from_secs(5));
        let index = IndexConfig::default();
        let request = SearchRequest {
            primary_field: "id",
            anns_field: "embedding",
            vector: &[0.0],
            limit: 1,
            index: &index,
            output_fields: &[],
            filter: None,
        };
        let err = backend.search("images", &request).unwrap_err();
        assert!(err.is_search());
        let body = store.received().body("/entities/search").unwrap();
        assert!(body.get("filter").is_none());
    }

    #[test]
    fn test_rebuild_keeps_build_params() {
        let store =
            FakeStore::start(|path, _| describe_images(path).unwrap_or_else(|| ok(json!({}))));
        let backend = connect(&store, Duration::from_secs(5));

        let desc = backend.describe_collection("images").unwrap();
        assert_eq!(desc.first_index().unwrap().params.get("nlist"), Some(&json!(128)));

        backend.rebuild_index("images").unwrap();
        let received = store.received();
        assert_eq!(received.count("/collections/release"), 1);
        assert_eq!(received.body("/indexes/drop").unwrap()["indexName"], "embedding");
        let create = received.body("/indexes/create").unwrap();
        let params = &create["indexParams"][0]["params"];
        assert_eq!(params["index_type"], "IVF_FLAT");
        assert_eq!(params["nlist"], 128);
        assert_eq!(create["indexParams"][0]["metricType"], "L2");
    }

    #[test]
    fn test_truncate_deletes_every_row() {
        let store = FakeStore::start(|path, _| {
            describe_images(path).unwrap_or_else(|| {
                if path.ends_with("/get_load_state") {
                    ok(json!({"loadState": "LoadStateLoaded"}))
                } else {
                    ok(json!({"deleteCount": 3}))
                }
            })
        });
        let backend = connect(&store, Duration::from_secs(5));
        backend.truncate_collection("images").unwrap();

        let body = store.received().body("/entities/delete").unwrap();
        assert_eq!(body["collectionName"], "images");
        assert_eq!(body["filter"], "id != \"\"");
        assert_eq!(store.received().count("/collections/drop"), 0);
    }
}
