//! Prometheus exporter for Chia full node and harvester state.
//!
//! Every scrape of the HTTP endpoint queries the enabled backends live and
//! converts their answers into gauges. Nothing is cached between scrapes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │  Backend RPC    │<────│ CollectionEngine │<────│   HTTP Server   │
//! │ (node/harvester)│────>│    + mapping     │────>│   (/metrics)    │
//! └─────────────────┘     └──────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! chia-exporter-prometheus --config config.json5 --collector.harvester
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod http;
pub mod mapping;
pub mod service;
pub mod source;

pub use collector::{CollectionEngine, EngineStats, SharedEngine};
pub use config::ExporterConfig;
pub use http::HttpServer;
pub use service::{ExporterService, SharedService};
pub use source::{BackendSource, build_sources};
