//! Configuration for the Prometheus exporter.

use chia_common::{
    ChiaConfig, LoggingConfig, ServiceEndpoint, SourceKind, TlsFiles, default_root_path,
    default_rpc_port,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Node root holding `config/config.yaml` (default: `$CHIA_ROOT` or `~/.chia/mainnet`).
    #[serde(default)]
    pub chia_root: Option<PathBuf>,

    /// Upper bound for a single backend fetch (seconds).
    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout_secs: u64,

    /// Which backends to query and how to reach them.
    #[serde(default)]
    pub collectors: CollectorsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_scrape_timeout() -> u64 {
    10
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

/// Per-backend collector settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectorsConfig {
    #[serde(default)]
    pub node: NodeCollectorConfig,

    #[serde(default)]
    pub harvester: HarvesterCollectorConfig,
}

/// How the node's netspace is obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetspaceStrategy {
    /// Header-delta estimate over the full node RPC.
    #[default]
    Rpc,
    /// Parse the human-readable output of a CLI command.
    Cli,
}

/// Full node collector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCollectorConfig {
    /// Collect `chia_node_netspace_bytes` (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// RPC host (default: `self_hostname` from the node config).
    #[serde(default)]
    pub host: Option<String>,

    /// RPC port (default: `full_node.rpc_port` from the node config).
    #[serde(default)]
    pub port: Option<u16>,

    /// Client certificate pair (default: `full_node.ssl` from the node config).
    #[serde(default)]
    pub tls: Option<TlsFiles>,

    #[serde(default)]
    pub strategy: NetspaceStrategy,

    /// Program and arguments run by the CLI strategy.
    #[serde(default = "default_cli_command")]
    pub cli_command: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_cli_command() -> Vec<String> {
    vec!["chia".to_string(), "netspace".to_string()]
}

impl Default for NodeCollectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: None,
            port: None,
            tls: None,
            strategy: NetspaceStrategy::default(),
            cli_command: default_cli_command(),
        }
    }
}

/// Harvester collector settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarvesterCollectorConfig {
    /// Collect `chia_harvester_plot_bytes` (default: false).
    #[serde(default)]
    pub enabled: bool,

    /// RPC host (default: `self_hostname` from the node config).
    #[serde(default)]
    pub host: Option<String>,

    /// RPC port (default: `harvester.rpc_port` from the node config).
    #[serde(default)]
    pub port: Option<u16>,

    /// Client certificate pair (default: `harvester.ssl` from the node config).
    #[serde(default)]
    pub tls: Option<TlsFiles>,
}

/// Connection parameters of one backend, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsFiles>,
}

impl SourceConfig {
    /// Base URL of the backend's RPC interface.
    pub fn base_url(&self) -> String {
        let scheme = if self.tls.is_some() { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scrape_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "scrape_timeout_secs must be > 0".to_string(),
            ));
        }

        // Validate listen address format
        if self.prometheus.listen.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            )));
        }

        // Validate path starts with /
        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        let node = &self.collectors.node;
        if node.strategy == NetspaceStrategy::Cli && node.cli_command.is_empty() {
            return Err(ConfigError::Validation(
                "cli_command must not be empty with the cli strategy".to_string(),
            ));
        }

        Ok(())
    }

    /// Replace the port of the listen address, keeping its host.
    pub fn set_listen_port(&mut self, port: u16) -> Result<(), ConfigError> {
        let mut addr: SocketAddr = self.prometheus.listen.parse().map_err(|_| {
            ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            ))
        })?;
        addr.set_port(port);
        self.prometheus.listen = addr.to_string();
        Ok(())
    }

    /// Effective node root.
    pub fn chia_root(&self) -> PathBuf {
        self.chia_root.clone().unwrap_or_else(default_root_path)
    }

    /// Per-fetch timeout.
    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }

    /// Resolve node then harvester connection parameters.
    ///
    /// Unset host/port/tls values are discovered from the node's
    /// `config.yaml`; if that file cannot be read, built-in defaults are used.
    pub fn resolve_sources(&self) -> Vec<SourceConfig> {
        let node = &self.collectors.node;
        let harvester = &self.collectors.harvester;

        let needs_discovery = (node.enabled
            && (node.host.is_none() || node.port.is_none() || node.tls.is_none()))
            || (harvester.enabled
                && (harvester.host.is_none()
                    || harvester.port.is_none()
                    || harvester.tls.is_none()));

        let root = self.chia_root();
        let discovered = if needs_discovery {
            match ChiaConfig::load(&root) {
                Ok(config) => {
                    debug!(root = %root.display(), "Loaded node configuration");
                    Some(config)
                }
                Err(e) => {
                    warn!(error = %e, "Node configuration unavailable, using defaults");
                    None
                }
            }
        } else {
            None
        };

        let endpoint = |kind| {
            discovered
                .as_ref()
                .and_then(|config| config.endpoint(kind, &root))
        };

        vec![
            resolve(
                SourceKind::Node,
                node.enabled,
                &node.host,
                node.port,
                &node.tls,
                endpoint(SourceKind::Node),
            ),
            resolve(
                SourceKind::Harvester,
                harvester.enabled,
                &harvester.host,
                harvester.port,
                &harvester.tls,
                endpoint(SourceKind::Harvester),
            ),
        ]
    }
}

fn resolve(
    kind: SourceKind,
    enabled: bool,
    host: &Option<String>,
    port: Option<u16>,
    tls: &Option<TlsFiles>,
    discovered: Option<ServiceEndpoint>,
) -> SourceConfig {
    let (discovered_host, discovered_port, discovered_tls) = match discovered {
        Some(endpoint) => (Some(endpoint.host), Some(endpoint.port), endpoint.tls),
        None => (None, None, None),
    };

    SourceConfig {
        kind,
        enabled,
        host: host
            .clone()
            .or(discovered_host)
            .unwrap_or_else(|| "localhost".to_string()),
        port: port
            .or(discovered_port)
            .unwrap_or_else(|| default_rpc_port(kind)),
        tls: tls.clone().or(discovered_tls),
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            prometheus: PrometheusConfig::default(),
            chia_root: None,
            scrape_timeout_secs: default_scrape_timeout(),
            collectors: CollectorsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
