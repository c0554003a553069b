use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{NewProfile, ProfileUpdate};
use crate::routes::{error_response, ApiError};
use crate::services::TracingNotifier;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LoadQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub load_last_profile: bool,
}

/// GET /api/profiles
pub async fn list_profiles(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.manager.list_profiles().await)
}

/// GET /api/profiles/:id
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.manager.find_profile(id).await.map_err(error_response)?;
    Ok(Json(profile))
}

/// POST /api/profiles - Register a playlist URL
pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewProfile>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .manager
        .add_profile(&payload.url, payload.name.as_deref())
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// PUT /api/profiles/:id - Rename
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Json(payload): Json<ProfileUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .manager
        .update_profile(id, &payload.name)
        .await
        .map_err(error_response)?;
    Ok(Json(profile))
}

/// DELETE /api/profiles/:id
pub async fn delete_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> Result<impl IntoResponse, ApiError> {
    state.manager.delete_profile(id).await.map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/profiles/:id/load?force=true
/// Downloads (or reads the cached copy of) the playlist and builds the catalog.
pub async fn load_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Query(query): Query<LoadQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .manager
        .load_catalog(id, query.force, &TracingNotifier)
        .await
        .map_err(error_response)?;
    Ok(Json(summary))
}

/// GET /api/settings
pub async fn get_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.manager.settings().await)
}

/// PUT /api/settings
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SettingsUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state
        .manager
        .set_load_last_profile(payload.load_last_profile)
        .await
        .map_err(error_response)?;
    Ok(Json(settings))
}
