use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Root endpoint - basic status
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "IPTV Catalog",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Storage stats
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StorageStats {
    backend: &'static str,
    healthy: bool,
}

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    uptime: u64,
    profiles: usize,
    storage: StorageStats,
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    let storage_ok = state.manager.storage_healthy().await;
    let profiles = state.manager.list_profiles().await.len();

    let health = HealthResponse {
        status: if storage_ok { "ok" } else { "degraded" }.to_string(),
        uptime,
        profiles,
        storage: StorageStats {
            backend: state.manager.storage_backend(),
            healthy: storage_ok,
        },
    };

    Json(health)
}

/// Readiness check
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.manager.storage_healthy().await {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready - storage unavailable")
    }
}

/// Liveness check
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}
