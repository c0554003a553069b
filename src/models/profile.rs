use serde::{Deserialize, Serialize};

use crate::models::catalog::GroupCounts;

/// A playlist source registered by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: u32,
    pub url: String,
    pub name: String,
    /// Milliseconds since epoch
    pub created_date: i64,
    /// Milliseconds since epoch, 0 when never loaded
    #[serde(default)]
    pub updated_date: i64,
    #[serde(default)]
    pub group_count: usize,
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub movie_count: usize,
    #[serde(default)]
    pub tv_show_count: usize,
    #[serde(default)]
    pub tv_show_season_count: usize,
    #[serde(default)]
    pub tv_show_episode_count: usize,
    #[serde(default)]
    pub live_stream_count: usize,
}

impl Profile {
    pub fn new(id: u32, url: &str, name: Option<&str>) -> Self {
        Self {
            id,
            url: url.to_string(),
            name: name
                .map(str::to_string)
                .unwrap_or_else(|| format!("profile#{}", id)),
            created_date: chrono::Utc::now().timestamp_millis(),
            updated_date: 0,
            group_count: 0,
            total_count: 0,
            movie_count: 0,
            tv_show_count: 0,
            tv_show_season_count: 0,
            tv_show_episode_count: 0,
            live_stream_count: 0,
        }
    }

    /// Copy catalog aggregate counts onto the profile
    pub fn apply_counts(&mut self, counts: &GroupCounts, group_count: usize) {
        self.group_count = group_count;
        self.total_count = counts.total_count;
        self.movie_count = counts.movie_count;
        self.tv_show_count = counts.tv_show_count;
        self.tv_show_season_count = counts.tv_show_season_count;
        self.tv_show_episode_count = counts.tv_show_episode_count;
        self.live_stream_count = counts.live_stream_count;
    }
}

/// Manager-wide settings persisted under `iptvConfig`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerSettings {
    #[serde(default, rename = "lastProfileID")]
    pub last_profile_id: Option<u32>,
    #[serde(default = "default_true")]
    pub load_last_profile: bool,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            last_profile_id: None,
            load_last_profile: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Request to register a profile
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Request to rename a profile
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: String,
}
