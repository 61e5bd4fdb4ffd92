//! HTTP server for the Prometheus scrape endpoint.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::service::{CONTENT_TYPE, SharedService};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    service: SharedService,
}

/// Create the HTTP router.
fn create_router(service: SharedService, metrics_path: &str) -> Router {
    let state = AppState { service };

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the metrics endpoint.
///
/// Backend outages only shrink the body; a 500 means encoding itself failed.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.service.scrape().await {
        Ok(body) => (StatusCode::OK, [("content-type", CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to render metrics: {e}\n"),
            )
                .into_response()
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// HTTP server configuration.
pub struct HttpServer {
    service: SharedService,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(service: SharedService, listen_addr: SocketAddr, metrics_path: String) -> Self {
        Self {
            service,
            listen_addr,
            metrics_path,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    ///
    /// A bind failure is returned to the caller.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let router = create_router(self.service, &self.metrics_path);

        info!(
            addr = %listener.local_addr()?,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectionEngine;
    use crate::service::ExporterService;
    use crate::source::BackendSource;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chia_common::{DomainSnapshot, SourceError, SourceKind};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::runtime::Handle;
    use tower::ServiceExt;

    #[derive(Debug)]
    struct DownSource;

    #[async_trait]
    impl BackendSource for DownSource {
        fn kind(&self) -> SourceKind {
            SourceKind::Node
        }

        async fn fetch(&self) -> Result<DomainSnapshot, SourceError> {
            Err(SourceError::unreachable("connection refused"))
        }
    }

    fn make_service(sources: Vec<Box<dyn BackendSource>>) -> SharedService {
        let engine = CollectionEngine::new(sources, Duration::from_secs(5));
        Arc::new(ExporterService::new(engine, Handle::current()))
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_metrics_endpoint() {
        let router = create_router(make_service(Vec::new()), "/metrics");

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response.headers().get("content-type").unwrap();
        assert!(
            content_type
                .to_str()
                .unwrap()
                .contains("application/openmetrics-text")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_backend_outage_still_ok() {
        let router = create_router(make_service(vec![Box::new(DownSource)]), "/metrics");

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(!body.contains("chia_node_netspace_bytes"));
        assert!(body.contains("chia_exporter_scrapes_total 1"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_health_endpoint() {
        let router = create_router(make_service(Vec::new()), "/metrics");

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_custom_metrics_path() {
        let router = create_router(make_service(Vec::new()), "/prometheus/metrics");

        let response = router
            .clone()
            .oneshot(
                Request::get("/prometheus/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bind_failure_propagates() {
        let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();
        let (_tx, rx) = watch::channel(false);

        let server = HttpServer::new(make_service(Vec::new()), addr, "/metrics".to_string());

        assert!(server.run(rx).await.is_err());
    }
}
