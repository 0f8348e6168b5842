//! Image embedding providers
//!
//! The `Embedder` trait turns an image file into a vector. `HttpEmbedder`
//! delegates to an external model service:
//!
//! ```text
//! POST <endpoint>  {"image": "<base64 file bytes>", "model": "resnet50"}
//! 200              {"embedding": [0.013, -0.402, ...]}
//! ```

use annlink_client::{HttpError, HttpTransport};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from an embedding provider
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Image file could not be read
    #[error("cannot read image '{path}': {source}")]
    Io {
        /// Image path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// Model service call failed
    #[error("embedding service: {0}")]
    Http(#[from] HttpError),
    /// Model service answered with something other than an embedding
    #[error("embedding response: {0}")]
    Parse(String),
}

/// Turns an image into an embedding vector
///
/// Object-safe so the pipeline can take `&dyn Embedder`.
pub trait Embedder: Send + Sync {
    /// Embed one image file
    fn embed(&self, path: &Path) -> Result<Vec<f32>, EmbedError>;

    /// Model name, for logs
    fn model(&self) -> &str;
}

/// Embedder backed by an HTTP model service
pub struct HttpEmbedder {
    transport: HttpTransport,
    model: String,
}

impl HttpEmbedder {
    /// Create an embedder for `endpoint`; `api_key` is sent as a bearer token
    pub fn new(endpoint: &str, model: &str, api_key: Option<&str>, timeout: Duration) -> Self {
        HttpEmbedder {
            transport: HttpTransport::new(
                endpoint,
                api_key.map(|k| format!("Bearer {}", k)),
                timeout,
            ),
            model: model.to_string(),
        }
    }
}

/// Extract `embedding` from a service response
fn parse_embedding(response: &serde_json::Value) -> Result<Vec<f32>, EmbedError> {
    let values = response
        .get("embedding")
        .and_then(|v| v.as_array())
        .ok_or_else(|| EmbedError::Parse("missing 'embedding' array".to_string()))?;
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_f64()
                .map(|x| x as f32)
                .ok_or_else(|| EmbedError::Parse(format!("component {} is not a number", i)))
        })
        .collect()
}

impl Embedder for HttpEmbedder {
    fn embed(&self, path: &Path) -> Result<Vec<f32>, EmbedError> {
        let bytes = std::fs::read(path).map_err(|e| EmbedError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let body = serde_json::json!({
            "image": STANDARD.encode(&bytes),
            "model": self.model,
        });
        let response = self.transport.post("", &body)?;
        let vector = parse_embedding(&response)?;
        tracing::trace!(
            target: "annlink::embed",
            path = %path.display(),
            dimension = vector.len(),
            "Embedded image"
        );
        Ok(vector)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
