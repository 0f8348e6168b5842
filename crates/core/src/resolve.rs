//! IndexConfig resolver
//!
//! Turns a collection's reported schema and indexes, plus optional caller
//! overrides, into the query configuration a Search client reuses for every
//! query it issues.
//!
//! ## Rules
//!
//! | Setting | Source, first match wins |
//! |---------|--------------------------|
//! | index type | `indexes[0]`, else IVF_FLAT; unknown types fall back to IVF_FLAT |
//! | search params | override, else static table for the index type |
//! | metric | override, else metric reported on `indexes[0]`, else L2 |
//! | anns field | override (must be a vector field), else first vector field |
//! | limit | override, else 10 |
//! | output fields | override, else none |
//! | filter | override, else none |

use crate::error::{AnnError, AnnResult};
use crate::index::{IndexConfig, IndexType, MetricType, SearchParams};
use crate::schema::CollectionDescriptor;
use serde::{Deserialize, Serialize};

/// Limit used when the caller does not supply one
pub const DEFAULT_LIMIT: usize = 10;

/// Caller-supplied overrides; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOverrides {
    /// Result count per query
    #[serde(default)]
    pub limit: Option<usize>,
    /// Ranking metric
    #[serde(default)]
    pub metric_type: Option<MetricType>,
    /// Vector field to search
    #[serde(default)]
    pub anns_field: Option<String>,
    /// Sidecar fields to return with each hit
    #[serde(default)]
    pub output_fields: Option<Vec<String>>,
    /// Explicit query knobs, replacing the table defaults
    #[serde(default)]
    pub search_params: Option<SearchParams>,
    /// Boolean expression restricting candidates, in the store's syntax
    #[serde(default)]
    pub filter: Option<String>,
}

impl SearchOverrides {
    /// Override the limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Override the metric
    pub fn metric_type(mut self, metric: MetricType) -> Self {
        self.metric_type = Some(metric);
        self
    }

    /// Override the vector field
    pub fn anns_field(mut self, field: impl Into<String>) -> Self {
        self.anns_field = Some(field.into());
        self
    }

    /// Request output fields
    pub fn output_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Override the query knobs
    pub fn search_params(mut self, params: SearchParams) -> Self {
        self.search_params = Some(params);
        self
    }

    /// Restrict candidates with a filter expression, e.g. `path == "a.jpg"`
    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.filter = Some(expr.into());
        self
    }
}

/// Query configuration for one collection, immutable after resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSearch {
    /// Index type, params and metric
    pub index: IndexConfig,
    /// Vector field searched
    pub anns_field: String,
    /// Dimension of `anns_field`
    pub dimension: usize,
    /// Default result count
    pub limit: usize,
    /// Sidecar fields fetched with each hit
    pub output_fields: Vec<String>,
    /// Filter expression sent with every query
    #[serde(default)]
    pub filter: Option<String>,
}

/// Resolve the query configuration for a collection
///
/// # Errors
///
/// - `Schema` if no vector field can be bound, or a requested field is unknown
/// - `InvalidInput` if the limit override is zero or the filter is blank
pub fn resolve(
    descriptor: &CollectionDescriptor,
    overrides: &SearchOverrides,
) -> AnnResult<ResolvedSearch> {
    let collection = descriptor.name.as_str();

    let index_type = match descriptor.first_index() {
        None => IndexType::IvfFlat,
        Some(index) => match IndexType::parse(&index.index_type) {
            Some(t) => t,
            None => {
                tracing::warn!(
                    target: "annlink::resolve",
                    collection,
                    index_type = %index.index_type,
                    "Unknown index type, using IVF_FLAT search defaults"
                );
                IndexType::IvfFlat
            }
        },
    };

    let search_params = overrides
        .search_params
        .clone()
        .unwrap_or_else(|| index_type.default_search_params());

    let metric_type = overrides
        .metric_type
        .or_else(|| descriptor.first_index().and_then(|i| i.metric_type))
        .unwrap_or_default();

    let vector_field = match overrides.anns_field.as_deref() {
        Some(name) => {
            let field = descriptor.field(name).ok_or_else(|| {
                AnnError::schema(collection, format!("anns_field '{}' does not exist", name))
            })?;
            if !field.field_type.is_vector() {
                return Err(AnnError::schema(
                    collection,
                    format!("anns_field '{}' is not a vector field", name),
                ));
            }
            field
        }
        None => descriptor.first_vector_field().ok_or_else(|| {
            AnnError::schema(collection, "collection has no vector field")
        })?,
    };
    let dimension = vector_field.field_type.dimension().unwrap_or_default();

    let limit = overrides.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 {
        return Err(AnnError::invalid_input("search limit must be > 0"));
    }

    let output_fields = overrides.output_fields.clone().unwrap_or_default();
    if !descriptor.dynamic_fields {
        if let Some(unknown) = output_fields.iter().find(|f| descriptor.field(f).is_none()) {
            return Err(AnnError::schema(
                collection,
                format!("output field '{}' does not exist", unknown),
            ));
        }
    }

    let filter = match overrides.filter.as_deref().map(str::trim) {
        Some("") => return Err(AnnError::invalid_input("search filter must not be blank")),
        Some(expr) => Some(expr.to_string()),
        None => None,
    };

    tracing::debug!(
        target: "annlink::resolve",
        collection,
        index_type = %index_type,
        metric = %metric_type,
        anns_field = %vector_field.name,
        limit,
        filter = filter.as_deref().unwrap_or("-"),
        "Resolved search configuration"
    );

    Ok(ResolvedSearch {
        index: IndexConfig {
            index_type,
            search_params,
            metric_type,
        },
        anns_field: vector_field.name.clone(),
        dimension,
        limit,
        output_fields,
        filter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::{CollectionSpec, FieldSchema, FieldType, IndexDescriptor};
    use std::collections::BTreeMap;

    fn bare(fields: Vec<FieldSchema>) -> CollectionDescriptor {
        CollectionDescriptor {
            name: "images".to_string(),
            fields,
            indexes: Vec::new(),
            dynamic_fields: false,
            loaded: None,
            row_count: None,
        }
    }

    fn with_index(index_type: &str, metric: Option<MetricType>) -> CollectionDescriptor {
        let mut desc = CollectionSpec::new("images", 4).to_descriptor();
        desc.indexes = vec![IndexDescriptor {
            field_name: "embedding".to_string(),
            index_name: "embedding".to_string(),
            index_type: index_type.to_string(),
            metric_type: metric,
            params: BTreeMap::new(),
        }];
        desc
    }

    fn standard_fields() -> Vec<FieldSchema> {
        vec![
            FieldSchema::primary("path", FieldType::VarChar { max_length: 500 }),
            FieldSchema::new("embedding", FieldType::FloatVector { dim: 4 }),
        ]
    }

    #[test]
    fn test_no_indexes_selects_ivf_flat() {
        let resolved = resolve(&bare(standard_fields()), &SearchOverrides::default()).unwrap();
        assert_eq!(resolved.index.index_type, IndexType::IvfFlat);
        assert_eq!(resolved.index.search_params.get("nprobe"), Some(&10));
        assert_eq!(resolved.index.metric_type, MetricType::L2);
        assert_eq!(resolved.limit, 10);
        assert_eq!(resolved.anns_field, "embedding");
        assert_eq!(resolved.dimension, 4);
        assert!(resolved.output_fields.is_empty());
        assert_eq!(resolved.filter, None);
    }

    #[test]
    fn test_hnsw_selects_ef_without_nprobe() {
        let resolved = resolve(&with_index("HNSW", None), &SearchOverrides::default()).unwrap();
        assert_eq!(resolved.index.index_type, IndexType::Hnsw);
        assert_eq!(resolved.index.search_params.get("ef"), Some(&10));
        assert!(!resolved.index.search_params.contains_key("nprobe"));
    }

    #[test]
    fn test_unknown_index_type_falls_back() {
        let resolved = resolve(&with_index("DISKANN", None), &SearchOverrides::default()).unwrap();
        assert_eq!(resolved.index.index_type, IndexType::IvfFlat);
        assert_eq!(resolved.index.search_params.get("nprobe"), Some(&10));
    }

    #[test]
    fn test_metric_precedence() {
        let cosine = with_index("HNSW", Some(MetricType::Cosine));
        let resolved = resolve(&cosine, &SearchOverrides::default()).unwrap();
        assert_eq!(resolved.index.metric_type, MetricType::Cosine);

        let overridden = resolve(&cosine, &SearchOverrides::default().metric_type(MetricType::Ip))
            .unwrap();
        assert_eq!(overridden.index.metric_type, MetricType::Ip);
    }

    #[test]
    fn test_first_vector_field_wins() {
        let resolved = resolve(
            &bare(vec![
                FieldSchema::primary("id", FieldType::Int64),
                FieldSchema::new("a", FieldType::BinaryVector { dim: 64 }),
                FieldSchema::new("b", FieldType::FloatVector { dim: 8 }),
            ]),
            &SearchOverrides::default(),
        )
        .unwrap();
        assert_eq!(resolved.anns_field, "a");
        assert_eq!(resolved.dimension, 64);
    }

    #[test]
    fn test_missing_vector_field_is_schema_error() {
        let err = resolve(
            &bare(vec![FieldSchema::primary("id", FieldType::Int64)]),
            &SearchOverrides::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_anns_field_override_must_be_vector() {
        let desc = bare(standard_fields());
        let err = resolve(&desc, &SearchOverrides::default().anns_field("path")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);

        let err = resolve(&desc, &SearchOverrides::default().anns_field("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);

        let ok = resolve(&desc, &SearchOverrides::default().anns_field("embedding")).unwrap();
        assert_eq!(ok.anns_field, "embedding");
    }

    #[test]
    fn test_explicit_params_replace_table() {
        let mut params = SearchParams::new();
        params.insert("nprobe".to_string(), 64);
        let resolved = resolve(
            &bare(standard_fields()),
            &SearchOverrides::default().search_params(params.clone()),
        )
        .unwrap();
        assert_eq!(resolved.index.search_params, params);
    }

    #[test]
    fn test_output_fields_checked_against_static_schema() {
        let desc = bare(standard_fields());
        assert!(resolve(&desc, &SearchOverrides::default().output_fields(["path"])).is_ok());
        let err = resolve(&desc, &SearchOverrides::default().output_fields(["label"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);

        let mut dynamic = desc.clone();
        dynamic.dynamic_fields = true;
        assert!(resolve(&dynamic, &SearchOverrides::default().output_fields(["label"])).is_ok());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let err = resolve(&bare(standard_fields()), &SearchOverrides::default().limit(0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_filter_trimmed_and_blank_rejected() {
        let desc = bare(standard_fields());
        let resolved =
            resolve(&desc, &SearchOverrides::default().filter("  path == \"a.jpg\" ")).unwrap();
        assert_eq!(resolved.filter.as_deref(), Some("path == \"a.jpg\""));

        let err = resolve(&desc, &SearchOverrides::default().filter("   ")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
