//! Network space from the full node.
//!
//! Two strategies are supported, selected once at startup:
//!
//! - **RPC** (default): read the peak height from `get_blockchain_state`,
//!   look up the header hashes of the peak and of the block
//!   [`BLOCK_WINDOW`] heights below it, and ask `get_network_space` for
//!   the estimate between them.
//! - **CLI**: run a command such as `chia netspace` and parse a size
//!   like `123.45TiB` from its output.

use async_trait::async_trait;
use chia_common::{DomainSnapshot, SourceError, SourceKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::BackendSource;
use super::rpc::RpcClient;

/// Distance in blocks between the two headers used for the estimate.
pub const BLOCK_WINDOW: u32 = 24;

/// Bytes per TiB.
const TIB: f64 = 1024.0 * 1024.0 * 1024.0 * 1024.0;

/// Output fragments printed by the CLI when no node answers.
const UNREACHABLE_MARKERS: &[&str] = &["Connection Failure", "Connection error"];

static SIZE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+\.\d+)\s?(?:TiB|TB)\b").expect("netspace size pattern is valid")
});

#[derive(Debug, Deserialize)]
struct BlockchainStateResponse {
    blockchain_state: BlockchainState,
}

#[derive(Debug, Deserialize)]
struct BlockchainState {
    #[serde(default)]
    peak: Option<Peak>,
}

#[derive(Debug, Deserialize)]
struct Peak {
    height: u32,
}

#[derive(Debug, Deserialize)]
struct BlockRecordResponse {
    block_record: BlockRecord,
}

#[derive(Debug, Deserialize)]
struct BlockRecord {
    header_hash: String,
}

#[derive(Debug, Deserialize)]
struct NetworkSpaceResponse {
    space: u128,
}

#[derive(Debug)]
enum Strategy {
    Rpc(RpcClient),
    Cli(Vec<String>),
}

/// Backend source producing [`DomainSnapshot::Netspace`].
#[derive(Debug)]
pub struct NodeNetspaceSource {
    strategy: Strategy,
}

impl NodeNetspaceSource {
    /// Query the full node RPC interface.
    pub fn rpc(client: RpcClient) -> Self {
        Self {
            strategy: Strategy::Rpc(client),
        }
    }

    /// Run `command` (program followed by arguments) and parse its output.
    pub fn cli(command: Vec<String>) -> Self {
        Self {
            strategy: Strategy::Cli(command),
        }
    }

    async fn fetch_rpc(client: &RpcClient) -> Result<u128, SourceError> {
        let state: BlockchainStateResponse =
            client.call("get_blockchain_state", json!({})).await?;

        let height = state
            .blockchain_state
            .peak
            .ok_or_else(|| SourceError::no_data("node has no peak yet"))?
            .height;

        let older_height = height.saturating_sub(BLOCK_WINDOW);
        if older_height == height {
            return Err(SourceError::no_data(format!(
                "chain height {height} too short for an estimate"
            )));
        }

        let newer = Self::header_hash(client, height).await?;
        let older = Self::header_hash(client, older_height).await?;

        let space: NetworkSpaceResponse = client
            .call(
                "get_network_space",
                json!({
                    "newer_block_header_hash": newer,
                    "older_block_header_hash": older,
                }),
            )
            .await?;

        debug!(height, older_height, space = %space.space, "Fetched netspace");
        Ok(space.space)
    }

    async fn header_hash(client: &RpcClient, height: u32) -> Result<String, SourceError> {
        let response: BlockRecordResponse = client
            .call("get_block_record_by_height", json!({ "height": height }))
            .await?;
        Ok(response.block_record.header_hash)
    }

    async fn fetch_cli(command: &[String]) -> Result<u128, SourceError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| SourceError::unreachable("no netspace command configured"))?;

        let output = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SourceError::unreachable(format!("failed to run {program}: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(status = %output.status, "Netspace command finished");
        parse_netspace_output(&stdout)
    }
}

#[async_trait]
impl BackendSource for NodeNetspaceSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Node
    }

    async fn fetch(&self) -> Result<DomainSnapshot, SourceError> {
        let total_bytes = match &self.strategy {
            Strategy::Rpc(client) => Self::fetch_rpc(client).await?,
            Strategy::Cli(command) => Self::fetch_cli(command).await?,
        };
        Ok(DomainSnapshot::Netspace { total_bytes })
    }
}

/// Extract the netspace in bytes from human-readable CLI output.
///
/// The size is a decimal number directly followed by `TiB` or `TB`, both
/// scaled by 1024^4. Output reporting a failed connection maps to
/// [`SourceError::Unreachable`]; no size, or several different sizes,
/// map to [`SourceError::NoData`].
pub fn parse_netspace_output(output: &str) -> Result<u128, SourceError> {
    if let Some(marker) = UNREACHABLE_MARKERS.iter().find(|m| output.contains(*m)) {
        return Err(SourceError::unreachable(format!(
            "node not reachable ({marker}): {}",
            output.trim()
        )));
    }

    let mut found: Option<u128> = None;
    for captures in SIZE_PATTERN.captures_iter(output) {
        let tib: f64 = captures[1]
            .parse()
            .map_err(|e| SourceError::no_data(format!("bad size '{}': {e}", &captures[1])))?;
        let bytes = (tib * TIB) as u128;

        match found {
            Some(previous) if previous != bytes => {
                return Err(SourceError::no_data(format!(
                    "ambiguous netspace output: {}",
                    output.trim()
                )));
            }
            _ => found = Some(bytes),
        }
    }

    found.ok_or_else(|| SourceError::no_data(format!("no size found in: {}", output.trim())))
}
