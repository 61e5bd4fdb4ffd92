//! Discovery of backend RPC parameters from the node's own `config.yaml`.
//!
//! A Chia installation keeps one YAML file under
//! `<root>/config/config.yaml` describing every service. The exporter
//! only needs the hostname, each service's RPC port and the private
//! certificate pair used to authenticate against that RPC port.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::snapshot::SourceKind;

/// Environment variable that overrides the default root path.
pub const CHIA_ROOT_ENV: &str = "CHIA_ROOT";

/// Default RPC port of a service when nothing else is known.
pub fn default_rpc_port(kind: SourceKind) -> u16 {
    match kind {
        SourceKind::Node => 8555,
        SourceKind::Harvester => 8560,
    }
}

/// The node root: `$CHIA_ROOT`, else `~/.chia/mainnet`.
pub fn default_root_path() -> PathBuf {
    if let Some(root) = std::env::var_os(CHIA_ROOT_ENV) {
        return PathBuf::from(root);
    }
    dirs::home_dir()
        .unwrap_or_default()
        .join(".chia")
        .join("mainnet")
}

/// Client certificate and key presented to a service's RPC port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsFiles {
    /// PEM certificate.
    pub cert: PathBuf,
    /// PEM private key.
    pub key: PathBuf,
}

/// Where and how to reach one service's RPC port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsFiles>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SslSection {
    private_crt: Option<PathBuf>,
    private_key: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ServiceSection {
    rpc_port: Option<u16>,
    #[serde(default)]
    ssl: Option<SslSection>,
}

/// The subset of `config.yaml` this exporter reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ChiaConfig {
    #[serde(default = "default_self_hostname")]
    self_hostname: String,
    #[serde(default)]
    full_node: Option<ServiceSection>,
    #[serde(default)]
    harvester: Option<ServiceSection>,
}

fn default_self_hostname() -> String {
    "localhost".to_string()
}

impl ChiaConfig {
    /// Location of `config.yaml` under a root.
    pub fn path_in(root: &Path) -> PathBuf {
        root.join("config").join("config.yaml")
    }

    /// Load `config.yaml` from a node root.
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::path_in(root);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!(
                "Failed to read node config '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    /// Parse `config.yaml` content.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Endpoint of a service, with certificate paths resolved against `root`.
    ///
    /// Returns `None` when the service has no section in the file.
    pub fn endpoint(&self, kind: SourceKind, root: &Path) -> Option<ServiceEndpoint> {
        let section = match kind {
            SourceKind::Node => self.full_node.as_ref(),
            SourceKind::Harvester => self.harvester.as_ref(),
        }?;

        let tls = section.ssl.as_ref().and_then(|ssl| {
            Some(TlsFiles {
                cert: root.join(ssl.private_crt.as_ref()?),
                key: root.join(ssl.private_key.as_ref()?),
            })
        });

        Some(ServiceEndpoint {
            host: self.self_hostname.clone(),
            port: section.rpc_port.unwrap_or_else(|| default_rpc_port(kind)),
            tls,
        })
    }
}
