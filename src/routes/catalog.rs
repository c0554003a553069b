use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::CatalogError;
use crate::models::{ListState, WatchableView};
use crate::routes::{error_response, ApiError};
use crate::services::CatalogList;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ListedRequest {
    pub url: String,
    pub state: ListState,
}

#[derive(Debug, Deserialize)]
pub struct PinnedRequest {
    pub key: String,
    pub pinned: bool,
}

#[derive(Debug, Deserialize)]
pub struct BannedRequest {
    pub key: String,
    pub banned: bool,
}

/// Search results; `cancelled` is set when a newer search superseded this one
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub cancelled: bool,
    pub items: Vec<WatchableView>,
}

/// GET /api/profiles/:id/catalog
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state.manager.summary(id).await.map_err(error_response)?;
    Ok(Json(summary))
}

/// GET /api/profiles/:id/catalog/:list
/// `list` is one of movies, tv-shows, live-streams, recent, favorites, watched.
pub async fn get_list(
    State(state): State<Arc<AppState>>,
    Path((id, list)): Path<(u32, CatalogList)>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.manager.view(id, list).await.map_err(error_response)?;
    Ok(Json(view))
}

/// GET /api/profiles/:id/search?q=
pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let found = state
        .manager
        .start_search(id, &query.q)
        .await
        .map_err(error_response)?;

    let now = Utc::now();
    let response = match found {
        Some(items) => SearchResponse {
            cancelled: false,
            items: items.iter().map(|item| WatchableView::new(item, now)).collect(),
        },
        None => SearchResponse {
            cancelled: true,
            items: Vec::new(),
        },
    };
    Ok(Json(response))
}

/// GET /api/profiles/:id/item?url=
pub async fn find_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Query(query): Query<ItemQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .manager
        .find_by_url(id, &query.url)
        .await
        .map_err(error_response)?
        .ok_or_else(|| error_response(CatalogError::ItemNotFound { url: query.url.clone() }))?;
    Ok(Json(WatchableView::new(&item, Utc::now())))
}

/// PUT /api/profiles/:id/listed - Add to favorites / watched, or clear
pub async fn set_listed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Json(payload): Json<ListedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let changed = state
        .manager
        .set_watchable_list(id, &payload.url, payload.state)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "changed": changed })))
}

/// PUT /api/profiles/:id/groups/pinned
pub async fn set_pinned(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Json(payload): Json<PinnedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let changed = state
        .manager
        .set_group_pinned(id, &payload.key, payload.pinned)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "changed": changed })))
}

/// PUT /api/profiles/:id/groups/banned
pub async fn set_banned(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Json(payload): Json<BannedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state
        .manager
        .set_group_banned(id, &payload.key, payload.banned)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}
