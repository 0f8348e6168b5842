//! Store clients for annlink
//!
//! - `Connection`: owned handle to one store session
//! - `UpsertClient`: validated writes into one collection
//! - `SearchClient`: nearest-neighbor queries with a resolved IndexConfig
//! - `VectorBackend`: the seam between clients and stores, implemented by
//!   `MilvusBackend`, `TcvdbBackend` and `MemoryBackend`
//! - `ClientConfig`: the `[backend]`, `[collection]` and `[search]` sections
//!   of `annlink.toml`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod connection;
pub mod http;
pub mod memory;
pub mod milvus;
pub mod search;
pub mod tcvdb;
pub mod upsert;

pub use backend::{BackendKind, RecordLayout, SearchRequest, VectorBackend};
pub use config::{BackendConfig, ClientConfig, CollectionConfig, SearchConfig};
pub use connection::{
    ConnectOptions, Connection, Credentials, HandleId, Target, DEFAULT_TIMEOUT,
};
pub use http::{HttpError, HttpTransport};
pub use memory::{MemoryBackend, MemoryStore};
pub use milvus::MilvusBackend;
pub use search::SearchClient;
pub use tcvdb::{ReadConsistency, TcvdbBackend};
pub use upsert::{NewRecord, UpsertClient};
