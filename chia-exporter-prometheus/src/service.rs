//! Exposition of collected families through a prometheus-client registry.

use std::fmt;
use std::sync::Arc;

use prometheus_client::collector::Collector;
use prometheus_client::encoding::{DescriptorEncoder, EncodeMetric};
use prometheus_client::metrics::MetricType;
use prometheus_client::metrics::counter::ConstCounter;
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::registry::Registry;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::debug;

use crate::collector::{CollectionEngine, EngineStats, SharedEngine};
use chia_common::MetricFamily;

/// Content type of the rendered exposition.
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

const SCRAPES_METRIC: &str = "chia_exporter_scrapes";
const FAILURES_METRIC: &str = "chia_exporter_source_failures";
const DURATION_METRIC: &str = "chia_exporter_last_scrape_duration_seconds";

/// Errors while producing a scrape response.
#[derive(Debug, Error)]
pub enum ExpositionError {
    #[error("Failed to encode metrics: {0}")]
    Encode(#[from] fmt::Error),
    #[error("Scrape task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Registry adapter that runs a full collection pass on every encode.
#[derive(Debug)]
struct ScrapeCollector {
    engine: SharedEngine,
    handle: Handle,
}

impl Collector for ScrapeCollector {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), fmt::Error> {
        let families = self.handle.block_on(self.engine.collect());

        for family in &families {
            encode_family(&mut encoder, family)?;
        }
        encode_stats(&mut encoder, &self.engine.stats())
    }
}

fn encode_family(encoder: &mut DescriptorEncoder, family: &MetricFamily) -> Result<(), fmt::Error> {
    let mut metric_encoder =
        encoder.encode_descriptor(&family.name, &family.help, None, MetricType::Gauge)?;

    for sample in &family.samples {
        let labels = family.labels_of(sample);
        ConstGauge::new(sample.value).encode(metric_encoder.encode_family(&labels)?)?;
    }
    Ok(())
}

fn encode_stats(encoder: &mut DescriptorEncoder, stats: &EngineStats) -> Result<(), fmt::Error> {
    let metric_encoder = encoder.encode_descriptor(
        SCRAPES_METRIC,
        "Collection passes run by the exporter",
        None,
        MetricType::Counter,
    )?;
    ConstCounter::new(stats.scrapes).encode(metric_encoder)?;

    let mut metric_encoder = encoder.encode_descriptor(
        FAILURES_METRIC,
        "Backend fetches that contributed no metrics",
        None,
        MetricType::Counter,
    )?;
    for ((kind, reason), count) in &stats.source_failures {
        let labels = [("source", kind.as_str()), ("reason", *reason)];
        ConstCounter::new(*count).encode(metric_encoder.encode_family(&labels.to_vec())?)?;
    }

    let metric_encoder = encoder.encode_descriptor(
        DURATION_METRIC,
        "Wall time of the most recent collection pass",
        None,
        MetricType::Gauge,
    )?;
    ConstGauge::new(stats.last_duration.as_secs_f64()).encode(metric_encoder)
}

/// Owns the exposition registry and the engine behind it.
///
/// The registry is private to the service; nothing is registered globally.
#[derive(Debug)]
pub struct ExporterService {
    engine: SharedEngine,
    registry: Registry,
}

impl ExporterService {
    /// Create a service whose collector drives `engine` on `handle`.
    pub fn new(engine: CollectionEngine, handle: Handle) -> Self {
        let engine = Arc::new(engine);
        let mut registry = Registry::default();
        registry.register_collector(Box::new(ScrapeCollector {
            engine: engine.clone(),
            handle,
        }));

        Self { engine, registry }
    }

    /// Collect and encode synchronously.
    ///
    /// Blocks on the runtime handle, so this must not be called from
    /// inside an async task. Use [`scrape`](Self::scrape) there.
    pub fn render(&self) -> Result<String, ExpositionError> {
        let mut body = String::new();
        prometheus_client::encoding::text::encode(&mut body, &self.registry)?;
        Ok(body)
    }

    /// Collect and encode on the blocking pool.
    pub async fn scrape(self: Arc<Self>) -> Result<String, ExpositionError> {
        let body = tokio::task::spawn_blocking(move || self.render()).await??;
        debug!(bytes = body.len(), "Rendered exposition");
        Ok(body)
    }

    /// Engine statistics.
    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }
}

/// Create a shareable service handle.
pub type SharedService = Arc<ExporterService>;
