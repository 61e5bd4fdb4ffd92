use serde::{Deserialize, Serialize};

/// Which backend a snapshot or failure belongs to.
///
/// Declaration order is collection order: node families are always
/// emitted before harvester families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Node,
    Harvester,
}

impl SourceKind {
    /// Get the string representation used in logs and labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Node => "node",
            SourceKind::Harvester => "harvester",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single plot as reported by the harvester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotRecord {
    pub filename: String,
    pub plot_seed: String,
    pub plot_public_key: String,
    pub pool_public_key: String,
    pub farmer_public_key: String,
    pub local_secret_key_identifier: String,
    /// The protocol k-size, not a byte count.
    pub declared_size: u32,
    pub file_size_bytes: u64,
}

/// Raw state fetched from one backend during a scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainSnapshot {
    /// Estimated total network space.
    Netspace {
        /// Bytes. Wider than `u64` because the live network can exceed 16 EiB.
        total_bytes: u128,
    },

    /// Plots currently loaded by a harvester, in harvester order.
    PlotList { plots: Vec<PlotRecord> },
}
