//! Integration tests for the Prometheus exporter.
//!
//! These tests drive the full flow from backend RPC responses to the
//! exposition served on the HTTP metrics endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use tokio::runtime::Handle;
use tokio::sync::watch;

use chia_exporter_prometheus::{
    CollectionEngine, ExporterConfig, ExporterService, HttpServer, build_sources,
};

/// Netspace above `u64::MAX`, as reported by mainnet.
const NETSPACE: u128 = 30_000_000_000_000_000_000;

/// Helper to find the value of the first sample line starting with `prefix`.
fn sample_value(body: &str, prefix: &str) -> Option<f64> {
    body.lines()
        .filter(|line| !line.starts_with('#'))
        .find(|line| line.starts_with(prefix))
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}

async fn mock_node(server: &mut ServerGuard) {
    server
        .mock("POST", "/get_blockchain_state")
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "blockchain_state": { "peak": { "height": 100 }, "sync": { "synced": true } },
                "success": true
            })
            .to_string(),
        )
        .create_async()
        .await;

    for (height, hash) in [(100, "0xnewer"), (76, "0xolder")] {
        server
            .mock("POST", "/get_block_record_by_height")
            .match_body(Matcher::PartialJson(json!({ "height": height })))
            .with_header("content-type", "application/json")
            .with_body(
                json!({ "block_record": { "header_hash": hash, "height": height }, "success": true })
                    .to_string(),
            )
            .create_async()
            .await;
    }

    server
        .mock("POST", "/get_network_space")
        .match_body(Matcher::PartialJson(json!({
            "newer_block_header_hash": "0xnewer",
            "older_block_header_hash": "0xolder",
        })))
        .with_header("content-type", "application/json")
        .with_body(format!(r#"{{"space": {NETSPACE}, "success": true}}"#))
        .create_async()
        .await;
}

async fn mock_harvester(server: &mut ServerGuard) {
    server
        .mock("POST", "/get_plots")
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "plots": [
                    {
                        "filename": "/plots/plot-k32-b.plot",
                        "plot-seed": "0xbbb",
                        "plot_public_key": "0xplot-b",
                        "pool_public_key": "0xpool",
                        "farmer_public_key": "0xfarmer",
                        "local_sk": "0xsk-b",
                        "size": 32,
                        "file_size": 108_836_000_000u64
                    },
                    {
                        "filename": "/plots/plot-k33-a.plot",
                        "size": 33,
                        "plot_id": "0xaaa",
                        "pool_public_key": null,
                        "pool_contract_puzzle_hash": "0xph",
                        "plot_public_key": "0xplot-a",
                        "file_size": 224_000_000_000u64,
                        "time_modified": 1_650_000_000.0,
                        "compression_level": 0
                    }
                ],
                "failed_to_open_filenames": [],
                "not_found_filenames": [],
                "success": true
            })
            .to_string(),
        )
        .create_async()
        .await;
}

/// Helper to build a config pointing both collectors at local ports.
fn make_config(node_port: u16, harvester_port: u16, harvester: bool) -> ExporterConfig {
    let root = tempfile::tempdir().unwrap();
    let json = format!(
        r#"{{
            chia_root: "{}",
            scrape_timeout_secs: 2,
            collectors: {{
                node: {{ host: "127.0.0.1", port: {node_port} }},
                harvester: {{ enabled: {harvester}, host: "127.0.0.1", port: {harvester_port} }},
            }},
        }}"#,
        root.path().join("missing").display()
    );
    ExporterConfig::parse(&json).unwrap()
}

/// Port nothing listens on.
async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Start the exporter on a random port and return its address.
async fn start_exporter(config: &ExporterConfig) -> (SocketAddr, watch::Sender<bool>) {
    let sources = build_sources(config);
    let engine = CollectionEngine::new(sources, config.scrape_timeout());
    let service = Arc::new(ExporterService::new(engine, Handle::current()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = HttpServer::new(service, addr, config.prometheus.path.clone());
    tokio::spawn(server.serve(listener, shutdown_rx));

    (addr, shutdown_tx)
}

async fn scrape(addr: SocketAddr) -> (reqwest::StatusCode, String) {
    let response = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();
    let status = response.status();
    (status, response.text().await.unwrap())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_flow_node_and_harvester() {
    let mut node = Server::new_async().await;
    let mut harvester = Server::new_async().await;
    mock_node(&mut node).await;
    mock_harvester(&mut harvester).await;

    let config = make_config(
        node.socket_address().port(),
        harvester.socket_address().port(),
        true,
    );
    let (addr, shutdown) = start_exporter(&config).await;

    let (status, body) = scrape(addr).await;

    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(
        sample_value(&body, "chia_node_netspace_bytes "),
        Some(NETSPACE as f64),
        "Body: {}",
        body
    );

    assert!(body.contains(
        "chia_harvester_plot_bytes{filename=\"/plots/plot-k32-b.plot\",plot_seed=\"0xbbb\",\
         plot_pk=\"0xplot-b\",pool_pk=\"0xpool\",farmer_pk=\"0xfarmer\",local_sk=\"0xsk-b\",\
         size=\"32\"}"
    ));
    assert!(body.contains(
        "chia_harvester_plot_bytes{filename=\"/plots/plot-k33-a.plot\",plot_seed=\"0xaaa\",\
         plot_pk=\"0xplot-a\",pool_pk=\"\",farmer_pk=\"\",local_sk=\"\",size=\"33\"}"
    ));
    assert_eq!(
        sample_value(&body, "chia_harvester_plot_bytes{filename=\"/plots/plot-k33-a.plot\""),
        Some(224_000_000_000.0)
    );

    // Plots keep the backend's order
    let b = body.find("plot-k32-b.plot").unwrap();
    let a = body.find("plot-k33-a.plot").unwrap();
    assert!(b < a);

    shutdown.send(true).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_harvester_outage_keeps_node_metrics() {
    let mut node = Server::new_async().await;
    mock_node(&mut node).await;

    let config = make_config(node.socket_address().port(), closed_port().await, true);
    let (addr, shutdown) = start_exporter(&config).await;

    let (status, body) = scrape(addr).await;

    assert_eq!(status, reqwest::StatusCode::OK);
    assert!(body.contains("chia_node_netspace_bytes "));
    assert!(!body.contains("chia_harvester_plot_bytes"));
    assert!(body.contains(
        "chia_exporter_source_failures_total{source=\"harvester\",reason=\"unreachable\"} 1"
    ));

    shutdown.send(true).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreadable_harvester_tls_keeps_node_metrics() {
    let mut node = Server::new_async().await;
    mock_node(&mut node).await;

    let json = format!(
        r#"{{
            chia_root: "/nonexistent/chia/root",
            collectors: {{
                node: {{ host: "127.0.0.1", port: {} }},
                harvester: {{
                    enabled: true,
                    host: "127.0.0.1",
                    port: 8560,
                    tls: {{
                        cert: "/nonexistent/private_harvester.crt",
                        key: "/nonexistent/private_harvester.key",
                    }},
                }},
            }},
        }}"#,
        node.socket_address().port()
    );
    let config = ExporterConfig::parse(&json).unwrap();
    let (addr, shutdown) = start_exporter(&config).await;

    let (status, body) = scrape(addr).await;

    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(
        sample_value(&body, "chia_node_netspace_bytes "),
        Some(NETSPACE as f64)
    );
    assert!(!body.contains("chia_harvester_plot_bytes"));
    assert!(body.contains(
        "chia_exporter_source_failures_total{source=\"harvester\",reason=\"unreachable\"} 1"
    ));

    shutdown.send(true).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_all_backends_down_still_ok() {
    let config = make_config(closed_port().await, closed_port().await, true);
    let (addr, shutdown) = start_exporter(&config).await;

    let (status, body) = scrape(addr).await;

    assert_eq!(status, reqwest::StatusCode::OK);
    assert!(!body.contains("chia_node_netspace_bytes"));
    assert!(!body.contains("chia_harvester_plot_bytes"));
    assert!(body.contains("chia_exporter_scrapes_total 1"));

    shutdown.send(true).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_node_rpc_failure_is_protocol_mismatch() {
    let mut node = Server::new_async().await;
    node.mock("POST", "/get_blockchain_state")
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "node is shutting down", "success": false}"#)
        .create_async()
        .await;

    let config = make_config(node.socket_address().port(), 0, false);
    let (addr, shutdown) = start_exporter(&config).await;

    let (status, body) = scrape(addr).await;

    assert_eq!(status, reqwest::StatusCode::OK);
    assert!(!body.contains("chia_node_netspace_bytes"));
    assert!(body.contains(
        "chia_exporter_source_failures_total{source=\"node\",reason=\"protocol_mismatch\"} 1"
    ));

    shutdown.send(true).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_node_without_peak_is_no_data() {
    let mut node = Server::new_async().await;
    node.mock("POST", "/get_blockchain_state")
        .with_header("content-type", "application/json")
        .with_body(r#"{"blockchain_state": {"peak": null}, "success": true}"#)
        .create_async()
        .await;

    let config = make_config(node.socket_address().port(), 0, false);
    let (addr, shutdown) = start_exporter(&config).await;

    let (_, body) = scrape(addr).await;

    assert!(body.contains(
        "chia_exporter_source_failures_total{source=\"node\",reason=\"no_data\"} 1"
    ));

    shutdown.send(true).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scrapes_query_backends_every_time() {
    let mut harvester = Server::new_async().await;
    let plots = harvester
        .mock("POST", "/get_plots")
        .with_header("content-type", "application/json")
        .with_body(r#"{"plots": [], "success": true}"#)
        .expect(3)
        .create_async()
        .await;

    let mut config = make_config(0, harvester.socket_address().port(), true);
    config.collectors.node.enabled = false;
    let (addr, shutdown) = start_exporter(&config).await;

    for _ in 0..3 {
        let (status, body) = scrape(addr).await;
        assert_eq!(status, reqwest::StatusCode::OK);
        assert!(body.contains("# TYPE chia_harvester_plot_bytes gauge"));
    }

    plots.assert_async().await;
    shutdown.send(true).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_graceful_shutdown() {
    let config = make_config(0, 0, false);
    let sources = build_sources(&config);
    let engine = CollectionEngine::new(sources, Duration::from_secs(1));
    let service = Arc::new(ExporterService::new(engine, Handle::current()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = HttpServer::new(service, addr, "/metrics".to_string());
    let task = tokio::spawn(server.serve(listener, shutdown_rx));

    shutdown_tx.send(true).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("server should stop")
        .unwrap();
    assert!(result.is_ok());
}
