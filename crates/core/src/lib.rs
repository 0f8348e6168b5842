//! Core types for annlink
//!
//! This crate defines the data model shared by every backend:
//! - VectorRecord / RecordId / FieldValue: what gets upserted
//! - SearchHit: what a query returns
//! - IndexType / MetricType / IndexConfig: query configuration
//! - DEFAULT_SEARCH_PARAMS: static index-type -> search-param table
//! - CollectionDescriptor / CollectionSpec: schema metadata
//! - resolve(): IndexConfig resolver
//! - AnnError: error taxonomy
//!
//! Nothing in this crate performs I/O against a store.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod index;
pub mod record;
pub mod resolve;
pub mod schema;
pub mod validate;

pub use error::{AnnError, AnnResult, ErrorKind};
pub use index::{IndexConfig, IndexType, MetricType, SearchParams, DEFAULT_SEARCH_PARAMS};
pub use record::{path_sidecar, FieldValue, RecordId, SearchHit, Sidecar, VectorRecord};
pub use resolve::{resolve, ResolvedSearch, SearchOverrides, DEFAULT_LIMIT};
pub use schema::{
    CollectionDescriptor, CollectionSpec, FieldSchema, FieldType, IndexDescriptor, IndexSpec,
};
pub use validate::{
    validate_collection_name, validate_key_length, validate_record_key, validate_sidecar,
    validate_vector,
};
