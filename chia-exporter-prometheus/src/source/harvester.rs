//! Plot list from the harvester.

use async_trait::async_trait;
use chia_common::{DomainSnapshot, PlotRecord, SourceError, SourceKind};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::BackendSource;
use super::rpc::RpcClient;

#[derive(Debug, Deserialize)]
struct PlotsResponse {
    plots: Vec<WirePlot>,
}

/// A plot as the harvester RPC reports it.
#[derive(Debug, Deserialize)]
struct WirePlot {
    filename: String,
    #[serde(rename = "plot-seed", alias = "plot_seed", alias = "plot_id")]
    plot_seed: String,
    plot_public_key: String,
    /// Null for plots bound to a pool contract.
    #[serde(default)]
    pool_public_key: Option<String>,
    /// Absent from plot entries of current harvesters.
    #[serde(default)]
    farmer_public_key: Option<String>,
    #[serde(default)]
    local_sk: Option<String>,
    size: u32,
    file_size: u64,
}

impl From<WirePlot> for PlotRecord {
    fn from(plot: WirePlot) -> Self {
        Self {
            filename: plot.filename,
            plot_seed: plot.plot_seed,
            plot_public_key: plot.plot_public_key,
            pool_public_key: plot.pool_public_key.unwrap_or_default(),
            farmer_public_key: plot.farmer_public_key.unwrap_or_default(),
            local_secret_key_identifier: plot.local_sk.unwrap_or_default(),
            declared_size: plot.size,
            file_size_bytes: plot.file_size,
        }
    }
}

/// Backend source producing [`DomainSnapshot::PlotList`].
#[derive(Debug)]
pub struct HarvesterPlotSource {
    client: RpcClient,
}

impl HarvesterPlotSource {
    pub fn new(client: RpcClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BackendSource for HarvesterPlotSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Harvester
    }

    async fn fetch(&self) -> Result<DomainSnapshot, SourceError> {
        let response: PlotsResponse = self.client.call("get_plots", json!({})).await?;
        debug!(plots = response.plots.len(), "Fetched plot list");

        Ok(DomainSnapshot::PlotList {
            plots: response.plots.into_iter().map(PlotRecord::from).collect(),
        })
    }
}
