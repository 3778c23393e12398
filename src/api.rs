//! Stats HTTP endpoint
//!
//! Serves Prometheus metrics and a JSON snapshot of the traffic monitor.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::metrics::{init_metrics, REGISTRY};
use crate::telemetry::TrafficMonitor;

/// JSON body of GET /api/stats
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub current_upload: u64,
    pub current_download: u64,
    pub current_total: u64,
    pub session_upload: u64,
    pub session_download: u64,
    pub session_total: u64,
    pub upload_speed: u64,
    pub download_speed: u64,
    pub history_len: usize,
}

impl StatsResponse {
    fn collect(monitor: &TrafficMonitor) -> Self {
        let (upload_speed, download_speed) = monitor.speed();
        let stats = monitor.stats();
        Self {
            current_upload: stats.current_upload,
            current_download: stats.current_download,
            current_total: stats.current_total,
            session_upload: stats.session_upload,
            session_download: stats.session_download,
            session_total: stats.session_total,
            upload_speed,
            download_speed,
            history_len: stats.history.len(),
        }
    }
}

/// Prometheus metrics endpoint
async fn get_metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
}

/// Traffic stats snapshot endpoint
async fn get_stats(State(monitor): State<Arc<TrafficMonitor>>) -> Json<StatsResponse> {
    Json(StatsResponse::collect(&monitor))
}

/// Build the API router
pub fn build_api_router(monitor: Arc<TrafficMonitor>) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/api/stats", get(get_stats))
        .with_state(monitor)
}

/// Start the stats API server
pub async fn start_api_server(
    addr: SocketAddr,
    monitor: Arc<TrafficMonitor>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    init_metrics();
    let app = build_api_router(monitor);

    info!("Stats API listening on http://{}/api/stats", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!("Failed to bind stats API to {}: {}", addr, e);
            return;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Stats API shutting down");
        })
        .await
        .unwrap_or_else(|e| {
            warn!("Stats API server error: {}", e);
        });
}
