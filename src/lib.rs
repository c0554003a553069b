//! IPTV catalog core.
//!
//! Parses M3U playlists, classifies entries into movies, TV episodes and live
//! streams, and organizes them into per-profile catalogs with persisted user
//! state. The binary wraps this in a JSON HTTP surface.

pub mod config;
pub mod errors;
pub mod models;
pub mod routes;
pub mod services;

use std::time::Instant;

use crate::config::Config;
use crate::services::IptvManager;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub manager: IptvManager,
    pub start_time: Instant,
}
