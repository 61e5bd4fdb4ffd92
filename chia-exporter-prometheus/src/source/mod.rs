//! Backend sources queried on every scrape.
//!
//! Each source wraps one backend service and knows how to turn its
//! current state into a [`DomainSnapshot`]. Adding a backend means adding
//! a [`BackendSource`] implementation and a mapping for its snapshot.

pub mod harvester;
pub mod node;
pub mod rpc;

use async_trait::async_trait;
use chia_common::{DomainSnapshot, SourceError, SourceKind};
use tracing::{info, warn};

use crate::config::{ExporterConfig, NetspaceStrategy};

pub use harvester::HarvesterPlotSource;
pub use node::{NodeNetspaceSource, parse_netspace_output};
pub use rpc::{RpcClient, RpcError};

/// One external data source.
#[async_trait]
pub trait BackendSource: Send + Sync + std::fmt::Debug {
    /// Which backend this is.
    fn kind(&self) -> SourceKind;

    /// Query the backend for its current state.
    ///
    /// Every call talks to the backend afresh; nothing is cached.
    async fn fetch(&self) -> Result<DomainSnapshot, SourceError>;
}

/// Stand-in for a source whose RPC client could not be built at startup.
///
/// Every fetch fails with [`SourceError::Unreachable`] so the failure shows
/// up per scrape without taking the other sources down with it.
#[derive(Debug)]
pub struct UnavailableSource {
    kind: SourceKind,
    reason: String,
}

impl UnavailableSource {
    pub fn new(kind: SourceKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl BackendSource for UnavailableSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self) -> Result<DomainSnapshot, SourceError> {
        Err(SourceError::unreachable(self.reason.clone()))
    }
}

/// Build the enabled sources, node first.
///
/// Disabled sources are never constructed and therefore never contacted.
/// A source whose client cannot be built (unreadable TLS files) stays in
/// the list as an [`UnavailableSource`].
pub fn build_sources(config: &ExporterConfig) -> Vec<Box<dyn BackendSource>> {
    let timeout = config.scrape_timeout();
    let mut sources: Vec<Box<dyn BackendSource>> = Vec::new();

    for source in config.resolve_sources() {
        if !source.enabled {
            continue;
        }

        let built: Result<Box<dyn BackendSource>, RpcError> = match source.kind {
            SourceKind::Node => match config.collectors.node.strategy {
                NetspaceStrategy::Rpc => RpcClient::new(&source, timeout).map(|client| {
                    Box::new(NodeNetspaceSource::rpc(client)) as Box<dyn BackendSource>
                }),
                NetspaceStrategy::Cli => Ok(Box::new(NodeNetspaceSource::cli(
                    config.collectors.node.cli_command.clone(),
                ))),
            },
            SourceKind::Harvester => RpcClient::new(&source, timeout).map(|client| {
                Box::new(HarvesterPlotSource::new(client)) as Box<dyn BackendSource>
            }),
        };

        match built {
            Ok(built) => {
                info!(
                    source = %source.kind,
                    endpoint = %source.base_url(),
                    "Enabled backend source"
                );
                sources.push(built);
            }
            Err(e) => {
                warn!(
                    source = %source.kind,
                    endpoint = %source.base_url(),
                    error = %e,
                    "Backend source unavailable, it will report no metrics"
                );
                sources.push(Box::new(UnavailableSource::new(source.kind, e.to_string())));
            }
        }
    }

    sources
}
