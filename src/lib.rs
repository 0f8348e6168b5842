//! annlink - similarity-search client layer for remote ANN stores
//!
//! annlink turns embedding vectors into records in a remote approximate
//! nearest-neighbor store and turns a query vector into a rank-ordered list
//! of nearest records. Milvus (RESTful v2) and Tencent Cloud VectorDB sit
//! behind one `VectorBackend` interface; an in-process memory store
//! implements the same interface for tests and offline runs.
//!
//! # Quick Start
//!
//! ```ignore
//! use annlink::{BackendKind, CollectionSpec, ConnectOptions, Connection, Credentials};
//! use annlink::{path_sidecar, SearchClient, SearchOverrides, Target, UpsertClient};
//!
//! let conn = Connection::open(
//!     Target::host_port("localhost", 19530),
//!     Credentials::None,
//!     ConnectOptions::new(BackendKind::Milvus),
//! )?;
//! conn.create_collection(&CollectionSpec::new("reverse_image_search", 2048))?;
//!
//! let writer = UpsertClient::new(conn, "reverse_image_search")?;
//! writer.upsert(None, embedding, path_sidecar("./train/goldfish/a.JPEG"))?;
//!
//! let searcher = SearchClient::new(
//!     Connection::open(/* ... */)?,
//!     "reverse_image_search",
//!     SearchOverrides::default().output_fields(["path"]),
//! )?;
//! let hits = searcher.search(&query, Some(10))?;
//! ```
//!
//! # Architecture
//!
//! - `annlink-core`: data model, errors, search-param table, resolver
//! - `annlink-client`: connections, backends, upsert and search clients
//! - `annlink-source`: image path enumeration (CSV manifest or glob)

pub use annlink_client::*;
pub use annlink_core::*;
pub use annlink_source::{ImageSource, PathIter, SourceError, SourceResult};
