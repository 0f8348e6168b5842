//! Shared HTTP transport for the remote backends
//!
//! Both remote stores speak JSON over HTTP POST. This module owns the
//! `ureq` agent, the auth header and the request/response plumbing so the
//! backends only deal with their own envelopes.

use std::fmt;
use std::time::Duration;

/// Errors that can occur when calling a store endpoint
#[derive(Debug)]
pub enum HttpError {
    /// Request failed before a response arrived (refused, DNS, TLS)
    Network(String),
    /// Request timed out
    Timeout,
    /// Store answered with a non-success HTTP status
    Status(u16),
    /// Response body was not the expected JSON
    Parse(String),
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::Network(msg) => write!(f, "network error: {}", msg),
            HttpError::Timeout => write!(f, "request timed out"),
            HttpError::Status(code) => write!(f, "HTTP status {}", code),
            HttpError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for HttpError {}

/// JSON-over-HTTP transport bound to one base URL
pub struct HttpTransport {
    base_url: String,
    agent: ureq::Agent,
    authorization: Option<String>,
}

impl HttpTransport {
    /// Create a transport
    ///
    /// `authorization` is sent verbatim as the `Authorization` header value.
    pub fn new(base_url: &str, authorization: Option<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::Agent::new_with_config(config),
            authorization,
        }
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON body to `{base_url}{path}` and parse the JSON response
    pub fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, HttpError> {
        let url = format!("{}{}", self.base_url, path);
        let body_bytes = serde_json::to_vec(body)
            .map_err(|e| HttpError::Parse(format!("failed to serialize request: {}", e)))?;

        let mut request = self
            .agent
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");

        if let Some(auth) = &self.authorization {
            request = request.header("Authorization", auth);
        }

        tracing::trace!(target: "annlink::http", %url, bytes = body_bytes.len(), "POST");

        let mut response = request.send(&body_bytes[..]).map_err(|e| match e {
            ureq::Error::StatusCode(code) => HttpError::Status(code),
            ureq::Error::Timeout(_) => HttpError::Timeout,
            other => HttpError::Network(other.to_string()),
        })?;

        let response_text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| HttpError::Network(format!("failed to read response: {}", e)))?;

        serde_json::from_str(&response_text).map_err(|e| {
            let preview: String = response_text.chars().take(200).collect();
            HttpError::Parse(format!("invalid JSON response ({}): {}", e, preview))
        })
    }
}

/// Build a base URL from host/port or a URI
///
/// URIs without a scheme get one from `secure`.
pub fn base_url(host: &str, port: u16, uri: Option<&str>, secure: bool) -> String {
    let scheme = if secure { "https" } else { "http" };
    match uri {
        Some(uri) if uri.contains("://") => uri.trim_end_matches('/').to_string(),
        Some(uri) => format!("{}://{}", scheme, uri.trim_end_matches('/')),
        None => format!("{}://{}:{}", scheme, host, port),
    }
}
