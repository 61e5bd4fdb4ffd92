//! Per-scrape collection across all enabled backend sources.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chia_common::{MetricFamily, SourceError, SourceKind};
use futures::future::join_all;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::mapping::map_snapshot;
use crate::source::BackendSource;

/// Failure tag recorded when a mapped family breaks its own schema.
const INVALID_FAMILY: &str = "invalid_family";

/// Engine statistics, exported alongside the collected families.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Completed collection passes.
    pub scrapes: u64,
    /// Failures by source and reason tag.
    pub source_failures: BTreeMap<(SourceKind, &'static str), u64>,
    /// Wall time of the most recent pass.
    pub last_duration: Duration,
}

impl EngineStats {
    /// Total failures recorded for one source.
    pub fn failures_for(&self, kind: SourceKind) -> u64 {
        self.source_failures
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, count)| count)
            .sum()
    }
}

/// Queries every enabled source and maps the results into metric families.
///
/// Nothing is cached between passes: each call to [`collect`] talks to
/// every source again. The only state kept is [`EngineStats`].
///
/// [`collect`]: CollectionEngine::collect
#[derive(Debug)]
pub struct CollectionEngine {
    /// Enabled sources in output order.
    sources: Vec<Box<dyn BackendSource>>,
    /// Bound on each individual fetch.
    timeout: Duration,
    stats: RwLock<EngineStats>,
}

impl CollectionEngine {
    /// Create an engine over `sources`, emitted in the order given.
    pub fn new(sources: Vec<Box<dyn BackendSource>>, timeout: Duration) -> Self {
        Self {
            sources,
            timeout,
            stats: RwLock::new(EngineStats::default()),
        }
    }

    /// Run one collection pass.
    ///
    /// Sources are fetched concurrently, each under its own timeout. A
    /// failing source contributes nothing; the others are unaffected.
    /// Families come back in source order.
    pub async fn collect(&self) -> Vec<MetricFamily> {
        let started = Instant::now();

        let fetches = self.sources.iter().map(|source| async move {
            let result = match tokio::time::timeout(self.timeout, source.fetch()).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::unreachable(format!(
                    "no response within {:?}",
                    self.timeout
                ))),
            };
            (source.kind(), result)
        });
        let results = join_all(fetches).await;

        let mut families = Vec::with_capacity(results.len());
        let mut failures: Vec<(SourceKind, &'static str)> = Vec::new();

        for (kind, result) in results {
            match result {
                Ok(snapshot) => {
                    let family = map_snapshot(&snapshot);
                    if let Err(e) = family.validate() {
                        warn!(source = %kind, error = %e, "Dropping malformed metric family");
                        failures.push((kind, INVALID_FAMILY));
                        continue;
                    }
                    debug!(
                        source = %kind,
                        family = %family.name,
                        samples = family.samples.len(),
                        "Collected metric family"
                    );
                    families.push(family);
                }
                Err(e) => {
                    info!(
                        source = %kind,
                        reason = e.reason(),
                        error = %e,
                        "Source contributed no metrics"
                    );
                    failures.push((kind, e.reason()));
                }
            }
        }

        let elapsed = started.elapsed();
        {
            let mut stats = self.stats.write();
            stats.scrapes += 1;
            stats.last_duration = elapsed;
            for key in failures {
                *stats.source_failures.entry(key).or_default() += 1;
            }
        }

        debug!(
            families = families.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Collection pass finished"
        );
        families
    }

    /// Get engine statistics.
    pub fn stats(&self) -> EngineStats {
        self.stats.read().clone()
    }
}

/// Create a shareable engine handle.
pub type SharedEngine = Arc<CollectionEngine>;
