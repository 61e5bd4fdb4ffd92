//! JSON-over-HTTPS client for the node's RPC services.
//!
//! Every Chia service exposes its RPC interface as `POST /<command>`
//! with a JSON body. Responses carry a `success` flag and, on failure,
//! an `error` message:
//!
//! ```json
//! { "plots": [ ... ], "success": true }
//! { "error": "Block 123 not found", "success": false }
//! ```

use std::path::Path;
use std::time::Duration;

use chia_common::SourceError;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::trace;

use crate::config::SourceConfig;

/// Errors building an RPC client at startup.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Failed to read TLS file '{path}': {source}")]
    TlsRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct RpcStatus {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for one service's RPC port.
///
/// Idle connections are never kept, so each call opens and closes its
/// own connection.
#[derive(Debug, Clone)]
pub struct RpcClient {
    base_url: String,
    client: reqwest::Client,
}

impl RpcClient {
    /// Build a client for `source`, loading its TLS identity if configured.
    pub fn new(source: &SourceConfig, timeout: Duration) -> Result<Self, RpcError> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0);

        if let Some(tls) = &source.tls {
            let mut pem = read_pem(&tls.cert)?;
            pem.push(b'\n');
            pem.extend(read_pem(&tls.key)?);

            // Services present certificates signed by the installation's
            // private CA, issued for a fixed hostname.
            builder = builder
                .use_rustls_tls()
                .identity(reqwest::Identity::from_pem(&pem)?)
                .danger_accept_invalid_certs(true);
        }

        Ok(Self {
            base_url: source.base_url(),
            client: builder.build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue `command` and decode the response into `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        command: &str,
        body: serde_json::Value,
    ) -> Result<T, SourceError> {
        let url = format!("{}/{}", self.base_url, command);
        trace!(%url, "RPC request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SourceError::unreachable(format!("POST {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::protocol(format!(
                "{command} returned HTTP status {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::unreachable(format!("reading {command} response: {e}")))?;

        let rpc_status: RpcStatus = serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::protocol(format!("{command} returned invalid JSON: {e}")))?;

        if rpc_status.success == Some(false) {
            let message = rpc_status.error.as_deref().unwrap_or("unknown error");
            return Err(SourceError::protocol(format!(
                "{command} failed: {message}"
            )));
        }

        // Decoded straight from bytes: values above u64::MAX must not pass
        // through serde_json::Value.
        serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::protocol(format!("unexpected {command} response: {e}")))
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, RpcError> {
    std::fs::read(path).map_err(|source| RpcError::TlsRead {
        path: path.display().to_string(),
        source,
    })
}
