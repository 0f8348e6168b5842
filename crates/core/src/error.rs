//! Error types for annlink
//!
//! Every client operation either returns its declared result or fails with
//! one of the variants below. None of them is retried internally.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for annlink operations
pub type AnnResult<T> = std::result::Result<T, AnnError>;

/// Coarse error taxonomy shared by all backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport or authentication failure, or use of a closed handle
    Connection,
    /// Dimensionality mismatch, missing vector field, unknown field
    Schema,
    /// Submission failure or accepted-count mismatch
    Insert,
    /// Remote query failure or collection not searchable
    Search,
    /// Administrative operation rejected by the store
    Backend,
    /// Caller supplied an invalid argument
    InvalidInput,
    /// Configuration could not be read or is inconsistent
    Config,
    /// Local I/O failure
    Io,
}

/// Error type for annlink
#[derive(Debug, Error)]
pub enum AnnError {
    /// Target unreachable, credentials rejected, or handle already closed
    #[error("Connection error ({target}): {message}")]
    Connection {
        /// Address or handle description
        target: String,
        /// What went wrong
        message: String,
    },

    /// Collection schema does not fit the request
    #[error("Schema error on '{collection}': {message}")]
    Schema {
        /// Collection name
        collection: String,
        /// What went wrong
        message: String,
    },

    /// The store rejected or failed an upsert
    #[error("Insert into '{collection}' failed: {message}")]
    Insert {
        /// Collection name
        collection: String,
        /// What went wrong
        message: String,
    },

    /// The store accepted fewer (or more) records than were submitted
    #[error(
        "Insert into '{collection}' partially accepted: \
         submitted {submitted}, accepted {accepted}"
    )]
    PartialInsert {
        /// Collection name
        collection: String,
        /// Records sent in the request
        submitted: usize,
        /// Records the store confirmed
        accepted: usize,
    },

    /// The store failed a search, or the collection is not loaded
    #[error("Search on '{collection}' failed: {message}")]
    Search {
        /// Collection name
        collection: String,
        /// What went wrong
        message: String,
    },

    /// Administrative operation (create, drop, index, describe) failed
    #[error("Backend error during {operation}: {message}")]
    Backend {
        /// Operation name, e.g. "create_collection"
        operation: &'static str,
        /// What went wrong
        message: String,
    },

    /// Invalid argument
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What went wrong
        message: String,
    },

    /// Configuration error
    #[error("Config error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AnnError {
    /// Build a `Connection` error
    pub fn connection(target: impl Into<String>, message: impl Into<String>) -> Self {
        AnnError::Connection {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Build a `Schema` error
    pub fn schema(collection: impl Into<String>, message: impl Into<String>) -> Self {
        AnnError::Schema {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Build an `Insert` error
    pub fn insert(collection: impl Into<String>, message: impl Into<String>) -> Self {
        AnnError::Insert {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Build a `Search` error
    pub fn search(collection: impl Into<String>, message: impl Into<String>) -> Self {
        AnnError::Search {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Build a `Backend` error
    pub fn backend(operation: &'static str, message: impl Into<String>) -> Self {
        AnnError::Backend {
            operation,
            message: message.into(),
        }
    }

    /// Build an `InvalidInput` error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        AnnError::InvalidInput {
            message: message.into(),
        }
    }

    /// Build a `Config` error
    pub fn config(message: impl Into<String>) -> Self {
        AnnError::Config {
            message: message.into(),
        }
    }

    /// Map this error onto the coarse taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnnError::Connection { .. } => ErrorKind::Connection,
            AnnError::Schema { .. } => ErrorKind::Schema,
            AnnError::Insert { .. } | AnnError::PartialInsert { .. } => ErrorKind::Insert,
            AnnError::Search { .. } => ErrorKind::Search,
            AnnError::Backend { .. } => ErrorKind::Backend,
            AnnError::InvalidInput { .. } => ErrorKind::InvalidInput,
            AnnError::Config { .. } => ErrorKind::Config,
            AnnError::Io(_) => ErrorKind::Io,
        }
    }

    /// Check if this is a connection error
    pub fn is_connection(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }

    /// Check if this is a schema error
    pub fn is_schema(&self) -> bool {
        self.kind() == ErrorKind::Schema
    }

    /// Check if this is an insert error (including partial acceptance)
    pub fn is_insert(&self) -> bool {
        self.kind() == ErrorKind::Insert
    }

    /// Check if this is a search error
    pub fn is_search(&self) -> bool {
        self.kind() == ErrorKind::Search
    }
}
