//! HTTP server for the metrics endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::collector::Registry;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    registry: Arc<Registry>,
    index: Arc<str>,
}

/// Create the HTTP router.
pub fn create_router(registry: Arc<Registry>, metrics_path: &str) -> Router {
    let state = AppState {
        registry,
        index: index_page(metrics_path).into(),
    };

    Router::new()
        .route("/", get(index_handler))
        .route(metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn index_page(metrics_path: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Mirakurun Exporter</title>
</head>
<body>
    <h1>Mirakurun Exporter</h1>
    <p><a href="{metrics_path}">Metrics</a></p>
</body>
</html>
"#
    )
}

async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(state.index.to_string())
}

/// Scrapes every collector on each request.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let body = state.registry.render().await;

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// HTTP server configuration.
pub struct HttpServer {
    registry: Arc<Registry>,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl HttpServer {
    pub fn new(registry: Arc<Registry>, listen_addr: SocketAddr, metrics_path: String) -> Self {
        Self {
            registry,
            listen_addr,
            metrics_path,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
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
        let addr = listener.local_addr()?;
        let router = create_router(self.registry, &self.metrics_path);

        info!(
            addr = %addr,
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

/// Wait up to `grace` for a server task to finish.
///
/// Returns `false`, after logging, when the task is still running.
pub async fn join_with_grace<T>(task: tokio::task::JoinHandle<T>, grace: Duration) -> bool {
    if tokio::time::timeout(grace, task).await.is_err() {
        warn!(
            grace_ms = grace.as_millis() as u64,
            "HTTP server did not stop in time"
        );
        return false;
    }
    true
}
