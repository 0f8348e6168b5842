//! Connection lifecycle
//!
//! A `Connection` is an explicit, owned handle to one logical session with
//! a store. It is moved into exactly one client, so two clients never share
//! transport state. Dropping the handle disconnects it.
//!
//! ## Credential modes
//!
//! | Mode | Target | Channel |
//! |------|--------|---------|
//! | `None` | host/port or URI | http unless `secure` |
//! | `Basic` | host/port or URI | http unless `secure` |
//! | `Token` | URI only | always https |

use crate::backend::{BackendKind, VectorBackend};
use crate::http::base_url;
use crate::memory::{MemoryBackend, MemoryStore};
use crate::milvus::MilvusBackend;
use crate::tcvdb::{ReadConsistency, TcvdbBackend};
use annlink_core::{
    validate_collection_name, AnnError, AnnResult, CollectionDescriptor, CollectionSpec,
    IndexSpec,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Default request timeout, matching the store SDK defaults
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Process-unique handle number, used to correlate log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    fn next() -> Self {
        HandleId(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where the store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Host and port; scheme chosen by the secure flag
    HostPort {
        /// Hostname or IP
        host: String,
        /// TCP port
        port: u16,
    },
    /// Full endpoint URI
    Uri(String),
}

impl Target {
    /// Host/port target
    pub fn host_port(host: impl Into<String>, port: u16) -> Self {
        Target::HostPort {
            host: host.into(),
            port,
        }
    }

    /// URI target
    pub fn uri(uri: impl Into<String>) -> Self {
        Target::Uri(uri.into())
    }

    /// Display label (`host:port` or the URI)
    pub fn label(&self) -> String {
        match self {
            Target::HostPort { host, port } => format!("{}:{}", host, port),
            Target::Uri(uri) => uri.clone(),
        }
    }

    /// Base URL for HTTP backends
    pub fn base_url(&self, secure: bool) -> String {
        match self {
            Target::HostPort { host, port } => base_url(host, *port, None, secure),
            Target::Uri(uri) => base_url("", 0, Some(uri), secure),
        }
    }
}

/// How to authenticate
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Credentials {
    /// Open access
    #[default]
    None,
    /// Username and secret (password or API key)
    Basic {
        /// Account name
        username: String,
        /// Password or API key
        secret: String,
    },
    /// Bearer token; requires a URI target and a secure channel
    Token {
        /// API token
        token: String,
    },
}

impl Credentials {
    /// Username and secret
    pub fn basic(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Bearer token
    pub fn token(token: impl Into<String>) -> Self {
        Credentials::Token {
            token: token.into(),
        }
    }

    /// Mode name for logs (never the secret)
    pub fn mode(&self) -> &'static str {
        match self {
            Credentials::None => "none",
            Credentials::Basic { .. } => "basic",
            Credentials::Token { .. } => "token",
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::None => f.write_str("None"),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("secret", &"***")
                .finish(),
            Credentials::Token { .. } => f.debug_struct("Token").field("token", &"***").finish(),
        }
    }
}

/// Options for opening a connection
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Which backend to speak
    pub kind: BackendKind,
    /// Per-request timeout
    pub timeout: Duration,
    /// Use https for host/port targets
    pub secure: bool,
    /// Database name; `None` uses the store default
    pub database: Option<String>,
    /// Read consistency for the managed store
    pub read_consistency: ReadConsistency,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            timeout: DEFAULT_TIMEOUT,
            secure: false,
            database: None,
            read_consistency: ReadConsistency::default(),
        }
    }
}

impl ConnectOptions {
    /// Options for a backend kind with defaults otherwise
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Override the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Force https
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Select a database
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set read consistency
    pub fn with_read_consistency(mut self, consistency: ReadConsistency) -> Self {
        self.read_consistency = consistency;
        self
    }
}

/// Owned handle to one store session
///
/// All administrative passthroughs fail with `Connection` once the handle
/// is closed.
pub struct Connection {
    id: HandleId,
    label: String,
    backend: Box<dyn VectorBackend>,
    closed: AtomicBool,
}

impl Connection {
    /// Open a connection and probe it once
    ///
    /// # Errors
    ///
    /// `Connection` if the credentials do not fit the target, the target is
    /// unreachable, or the store rejects the credentials.
    pub fn open(
        target: Target,
        credentials: Credentials,
        options: ConnectOptions,
    ) -> AnnResult<Self> {
        let label = target.label();

        if matches!(credentials, Credentials::Token { .. }) && !matches!(target, Target::Uri(_)) {
            return Err(AnnError::connection(
                label,
                "token credentials require a URI target",
            ));
        }

        let backend: Box<dyn VectorBackend> = match options.kind {
            BackendKind::Milvus => Box::new(MilvusBackend::new(&target, &credentials, &options)),
            BackendKind::Tcvdb => Box::new(TcvdbBackend::new(&target, &credentials, &options)?),
            BackendKind::Memory => {
                Box::new(MemoryBackend::new(MemoryStore::named(&label)))
            }
        };

        tracing::debug!(
            target: "annlink::connection",
            target_addr = %label,
            kind = %options.kind,
            auth = credentials.mode(),
            "Opening connection"
        );

        Self::establish(backend, label)
    }

    /// Wrap a caller-built backend, probing it once
    pub fn from_backend(backend: Box<dyn VectorBackend>) -> AnnResult<Self> {
        let label = format!("custom {}", backend.kind());
        Self::establish(backend, label)
    }

    fn establish(backend: Box<dyn VectorBackend>, label: String) -> AnnResult<Self> {
        backend.ping().map_err(|e| match e {
            AnnError::Connection { .. } => e,
            other => AnnError::connection(label.clone(), other.to_string()),
        })?;

        let id = HandleId::next();
        tracing::info!(
            target: "annlink::connection",
            handle = %id,
            target_addr = %label,
            kind = %backend.kind(),
            "Connected"
        );

        Ok(Self {
            id,
            label,
            backend,
            closed: AtomicBool::new(false),
        })
    }

    /// Handle number
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Target label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Backend kind
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Whether `disconnect` has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Borrow the backend of an open handle
    pub fn backend(&self) -> AnnResult<&dyn VectorBackend> {
        if self.is_closed() {
            return Err(AnnError::connection(
                format!("{} ({})", self.label, self.id),
                "connection is closed",
            ));
        }
        Ok(self.backend.as_ref())
    }

    /// Close the session; a second call is a no-op
    pub fn disconnect(&self) -> AnnResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::info!(
            target: "annlink::connection",
            handle = %self.id,
            target_addr = %self.label,
            "Disconnected"
        );
        self.backend.close()
    }

    /// Check whether a collection exists
    pub fn has_collection(&self, name: &str) -> AnnResult<bool> {
        self.backend()?.has_collection(name)
    }

    /// Report schema and index metadata
    pub fn describe_collection(&self, name: &str) -> AnnResult<CollectionDescriptor> {
        validate_collection_name(name)?;
        self.backend()?.describe_collection(name)
    }

    /// Create a collection
    pub fn create_collection(&self, spec: &CollectionSpec) -> AnnResult<()> {
        validate_collection_name(&spec.name)?;
        if spec.dimension == 0 {
            return Err(AnnError::invalid_input(format!(
                "Invalid dimension: {} (must be > 0)",
                spec.dimension
            )));
        }
        self.backend()?.create_collection(spec)?;
        tracing::info!(
            target: "annlink::connection",
            handle = %self.id,
            collection = %spec.name,
            dimension = spec.dimension,
            index_type = %spec.index.index_type,
            metric = %spec.index.metric_type,
            "Created collection"
        );
        Ok(())
    }

    /// Drop a collection
    pub fn drop_collection(&self, name: &str) -> AnnResult<()> {
        self.backend()?.drop_collection(name)?;
        tracing::info!(
            target: "annlink::connection",
            handle = %self.id,
            collection = name,
            "Dropped collection"
        );
        Ok(())
    }

    /// Delete every record in a collection, keeping its schema and indexes
    pub fn truncate_collection(&self, name: &str) -> AnnResult<()> {
        validate_collection_name(name)?;
        self.backend()?.truncate_collection(name)?;
        tracing::info!(
            target: "annlink::connection",
            handle = %self.id,
            collection = name,
            "Truncated collection"
        );
        Ok(())
    }

    /// Drop the collection if it exists, then create it
    pub fn recreate_collection(&self, spec: &CollectionSpec) -> AnnResult<()> {
        if self.has_collection(&spec.name)? {
            self.drop_collection(&spec.name)?;
        }
        self.create_collection(spec)
    }

    /// Build an index on a field
    pub fn create_index(&self, name: &str, field: &str, index: &IndexSpec) -> AnnResult<()> {
        self.backend()?.create_index(name, field, index)
    }

    /// Rebuild the vector index
    ///
    /// Clients built before the rebuild keep their resolved configuration;
    /// construct new ones if the index type changed.
    pub fn rebuild_index(&self, name: &str) -> AnnResult<()> {
        self.backend()?.rebuild_index(name)
    }

    /// Load a collection for querying
    pub fn load_collection(&self, name: &str) -> AnnResult<()> {
        self.backend()?.load_collection(name)
    }

    /// Number of records in a collection
    pub fn count(&self, name: &str) -> AnnResult<u64> {
        self.backend()?.count(name)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            tracing::warn!(
                target: "annlink::connection",
                handle = %self.id,
                error = %e,
                "Error while closing connection"
            );
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("kind", &self.backend.kind())
            .field("closed", &self.is_closed())
            .finish()
    }
}
