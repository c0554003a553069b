//! HTTP handlers
//!
//! Thin JSON wrappers over `IptvManager`. Every handler takes the shared
//! `AppState` and maps `CatalogError` to a status code with an
//! `{"error": "..."}` body.

pub mod catalog;
pub mod health;
pub mod profiles;

use axum::{
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::errors::CatalogError;
use crate::AppState;

pub type ApiError = (StatusCode, Json<serde_json::Value>);

/// Map a catalog error to an HTTP error response
pub fn error_response(err: CatalogError) -> ApiError {
    let status = match &err {
        CatalogError::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
        CatalogError::ProfileNotFound { .. } | CatalogError::ItemNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        CatalogError::DuplicateProfile { .. } | CatalogError::LoadInProgress { .. } => {
            StatusCode::CONFLICT
        }
        CatalogError::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CatalogError::Fetch(_) => StatusCode::BAD_GATEWAY,
        CatalogError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("{}", err);
    } else {
        tracing::debug!("{}", err);
    }

    (status, Json(serde_json::json!({ "error": err.to_string() })))
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready))
        .route("/live", get(health::live))
        // Settings
        .route(
            "/api/settings",
            get(profiles::get_settings).put(profiles::update_settings),
        )
        // Profile endpoints
        .route(
            "/api/profiles",
            get(profiles::list_profiles).post(profiles::create_profile),
        )
        .route(
            "/api/profiles/:id",
            get(profiles::get_profile)
                .put(profiles::update_profile)
                .delete(profiles::delete_profile),
        )
        .route("/api/profiles/:id/load", post(profiles::load_profile))
        // Catalog endpoints
        .route("/api/profiles/:id/catalog", get(catalog::get_summary))
        .route("/api/profiles/:id/catalog/:list", get(catalog::get_list))
        .route("/api/profiles/:id/search", get(catalog::search))
        .route("/api/profiles/:id/item", get(catalog::find_item))
        .route("/api/profiles/:id/listed", put(catalog::set_listed))
        .route("/api/profiles/:id/groups/pinned", put(catalog::set_pinned))
        .route("/api/profiles/:id/groups/banned", put(catalog::set_banned))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
