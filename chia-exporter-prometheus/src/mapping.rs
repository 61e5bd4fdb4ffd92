//! Mapping from domain snapshots to metric families.
//!
//! Names and label schemas here are a stable contract with dashboards
//! and alert rules; label order is part of it.

use chia_common::{DomainSnapshot, MetricFamily, PlotRecord};

/// Aggregate network space.
pub const NETSPACE_METRIC: &str = "chia_node_netspace_bytes";
pub const NETSPACE_HELP: &str = "The Chia Netspace in Bytes";

/// Per-plot file size.
pub const PLOT_METRIC: &str = "chia_harvester_plot_bytes";
pub const PLOT_HELP: &str = "Plots being harvested";
pub const PLOT_LABELS: [&str; 7] = [
    "filename",
    "plot_seed",
    "plot_pk",
    "pool_pk",
    "farmer_pk",
    "local_sk",
    "size",
];

/// Translate any snapshot into its family.
pub fn map_snapshot(snapshot: &DomainSnapshot) -> MetricFamily {
    match snapshot {
        DomainSnapshot::Netspace { total_bytes } => map_netspace(*total_bytes),
        DomainSnapshot::PlotList { plots } => map_plots(plots),
    }
}

/// One unlabeled sample holding the netspace in bytes.
pub fn map_netspace(total_bytes: u128) -> MetricFamily {
    let mut family = MetricFamily::new(NETSPACE_METRIC, NETSPACE_HELP, std::iter::empty::<&str>());
    family.push(Vec::new(), total_bytes as f64);
    family
}

/// One sample per plot, in input order.
///
/// The `size` label carries the plot's k-size while the value is its file
/// size in bytes. An empty list still yields the family, with no samples.
pub fn map_plots(plots: &[PlotRecord]) -> MetricFamily {
    let mut family = MetricFamily::new(PLOT_METRIC, PLOT_HELP, PLOT_LABELS);

    for plot in plots {
        family.push(
            vec![
                plot.filename.clone(),
                plot.plot_seed.clone(),
                plot.plot_public_key.clone(),
                plot.pool_public_key.clone(),
                plot.farmer_public_key.clone(),
                plot.local_secret_key_identifier.clone(),
                plot.declared_size.to_string(),
            ],
            plot.file_size_bytes as f64,
        );
    }

    family
}
