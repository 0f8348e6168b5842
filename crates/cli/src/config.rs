//! CLI configuration via `annlink.toml`
//!
//! `annlink config init` writes a commented default file. Every other command
//! reads it, so changing stores or collections means editing one file.

use annlink_client::{BackendConfig, ClientConfig, CollectionConfig, SearchConfig};
use annlink_core::{AnnError, AnnResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "annlink.toml";

/// `[embedder]`: the image embedding service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedderConfig {
    /// Service endpoint accepting `{"image", "model"}` POSTs
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model name forwarded to the service
    #[serde(default = "default_model")]
    pub model: String,
    /// Optional API key for authenticated endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Request timeout in milliseconds (default: 30000)
    #[serde(default = "default_embed_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_endpoint() -> String {
    "http://localhost:8080/embed".to_string()
}

fn default_model() -> String {
    "resnet50".to_string()
}

fn default_embed_timeout_ms() -> u64 {
    30_000
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            timeout_ms: default_embed_timeout_ms(),
        }
    }
}

impl EmbedderConfig {
    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Everything in `annlink.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// `[backend]`
    #[serde(default)]
    pub backend: BackendConfig,
    /// `[collection]`
    #[serde(default)]
    pub collection: CollectionConfig,
    /// `[search]`
    #[serde(default)]
    pub search: SearchConfig,
    /// `[embedder]`
    #[serde(default)]
    pub embedder: EmbedderConfig,
}

impl AppConfig {
    /// Store-facing sections
    pub fn client(&self) -> ClientConfig {
        ClientConfig {
            backend: self.backend.clone(),
            collection: self.collection.clone(),
            search: self.search.clone(),
        }
    }

    /// Check every section
    pub fn validate(&self) -> AnnResult<()> {
        self.client().validate()?;
        if self.embedder.endpoint.is_empty() {
            return Err(AnnError::config("[embedder] endpoint cannot be empty"));
        }
        if self.embedder.timeout_ms == 0 {
            return Err(AnnError::config("[embedder] timeout_ms must be > 0"));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# annlink configuration
#
# Vector store connection.
# kind: "milvus" (default), "tcvdb" (Tencent Cloud VectorDB) or "memory"
[backend]
kind = "milvus"
host = "localhost"
port = 19530
# uri = "https://in01-xxx.cloud.example.com:19530"   # instead of host/port
# username = "root"
# password = "Milvus"          # tcvdb: the API key
# token = "..."                # milvus token auth, requires uri
# database = "default"         # tcvdb only
# secure = false               # https for host/port targets
# read_consistency = "eventual"  # tcvdb only: "eventual" or "strong"
timeout_ms = 20000

# Collection to write to and search.
# index_type and metric_type apply when `annlink collection create` builds it.
[collection]
name = "reverse_image_search"
dimension = 2048
index_type = "IVF_FLAT"
metric_type = "L2"
# nlist = 2048                 # IVF_FLAT
# m = 16                       # HNSW
# ef_construction = 200        # HNSW
# shards = 1                   # tcvdb only
# replicas = 0                 # tcvdb only

# Query defaults. metric_type and params default to what the collection's
# index dictates.
[search]
limit = 10
output_fields = ["path"]
# metric_type = "L2"
# params = { nprobe = 10 }
# filter = 'path like "/data/cats/%"'

# Image embedding service.
[embedder]
endpoint = "http://localhost:8080/embed"
model = "resnet50"
# api_key = "your-api-key"     # optional
timeout_ms = 30000
"#
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> AnnResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AnnError::config(format!(
                "Failed to read config file '{}': {} (run `annlink config init` to create one)",
                path.display(),
                e
            ))
        })?;
        let config: AppConfig = toml::from_str(&content).map_err(|e| {
            AnnError::config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `true` if the file was created.
    pub fn write_default_if_missing(path: &Path) -> AnnResult<bool> {
        if path.exists() {
            return Ok(false);
        }
        std::fs::write(path, Self::default_toml()).map_err(|e| {
            AnnError::config(format!(
                "Failed to write default config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(true)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> AnnResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AnnError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            AnnError::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annlink_client::BackendKind;
    use tempfile::TempDir;

    #[test]
    fn default_toml_parses_to_defaults() {
        let config: AppConfig = toml::from_str(AppConfig::default_toml()).unwrap();
        assert_eq!(config, AppConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(AppConfig::write_default_if_missing(&path).unwrap());

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.collection.name, "reverse_image_search");
        assert_eq!(config.embedder.model, "resnet50");
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[collection]\nname = \"mine\"\n").unwrap();

        assert!(!AppConfig::write_default_if_missing(&path).unwrap());
        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.collection.name, "mine");
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = AppConfig::from_file(Path::new("/nonexistent/annlink.toml")).unwrap_err();
        assert_eq!(err.kind(), annlink_core::ErrorKind::Config);
    }

    #[test]
    fn invalid_values_rejected_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[collection]\nmetric_type = \"HAMMING\"\n").unwrap();
        assert!(AppConfig::from_file(&path).is_err());
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = AppConfig::default();
        config.backend.kind = BackendKind::Memory;
        config.backend.uri = Some("memory://round-trip".to_string());
        config.search.limit = 3;
        config.embedder.api_key = Some("sk-test".to_string());

        config.write_to_file(&path).unwrap();
        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
