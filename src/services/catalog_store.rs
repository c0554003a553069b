use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Serialize};

use crate::errors::StorageError;
use crate::models::ListState;
use crate::services::catalog::CatalogState;
use crate::services::storage::{Storage, StorageExt};

pub const PINNED_GROUPS: &str = "pinnedGroups";
pub const LATELY_ADDED: &str = "latelyAdded";
pub const BANNED_GROUPS: &str = "bannedGroups";
pub const LISTED_ITEMS: &str = "listedItems";
pub const CACHED_PLAYLIST: &str = "m3u";

/// Every per-profile key suffix
pub const PROFILE_KEY_SUFFIXES: [&str; 5] = [
    CACHED_PLAYLIST,
    PINNED_GROUPS,
    LATELY_ADDED,
    BANNED_GROUPS,
    LISTED_ITEMS,
];

pub fn profile_key(profile_id: u32, suffix: &str) -> String {
    format!("profile#{}#{}", profile_id, suffix)
}

/// Per-profile persistence of catalog state.
///
/// Maps and sets are stored as JSON arrays (`[[url, state], ...]`,
/// `[[date, [url, ...]], ...]`, `[key, ...]`). An empty collection removes its
/// key. Reads never fail: a missing or unreadable key loads as empty.
#[derive(Clone)]
pub struct CatalogStore {
    storage: Arc<dyn Storage>,
}

impl CatalogStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    async fn load_or_default<T: DeserializeOwned + Default + Send>(&self, key: &str) -> T {
        match self.storage.get_json(key).await {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(e) => {
                tracing::warn!("Ignoring saved {}: {}", key, e);
                T::default()
            }
        }
    }

    async fn save_or_remove<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        is_empty: bool,
    ) -> Result<(), StorageError> {
        if is_empty {
            self.storage.remove(key).await
        } else {
            self.storage.set_json(key, value).await
        }
    }

    pub async fn load_state(&self, profile_id: u32) -> CatalogState {
        let listed: Vec<(String, ListState)> =
            self.load_or_default(&profile_key(profile_id, LISTED_ITEMS)).await;
        let pinned: Vec<String> = self.load_or_default(&profile_key(profile_id, PINNED_GROUPS)).await;
        let banned: Vec<String> = self.load_or_default(&profile_key(profile_id, BANNED_GROUPS)).await;
        let lately: Vec<(NaiveDate, Vec<String>)> =
            self.load_or_default(&profile_key(profile_id, LATELY_ADDED)).await;

        CatalogState {
            listed_items: listed
                .into_iter()
                .filter(|(_, state)| *state != ListState::None)
                .collect(),
            pinned_groups: pinned.into_iter().collect(),
            banned_groups: banned.into_iter().collect(),
            lately_added: lately.into_iter().collect(),
        }
    }

    pub async fn save_listed_items(
        &self,
        profile_id: u32,
        listed: &BTreeMap<String, ListState>,
    ) -> Result<(), StorageError> {
        let pairs: Vec<(&String, &ListState)> = listed.iter().collect();
        self.save_or_remove(&profile_key(profile_id, LISTED_ITEMS), &pairs, pairs.is_empty())
            .await
    }

    pub async fn save_pinned_groups(&self, profile_id: u32, pinned: &BTreeSet<String>) -> Result<(), StorageError> {
        self.save_or_remove(&profile_key(profile_id, PINNED_GROUPS), pinned, pinned.is_empty())
            .await
    }

    pub async fn save_banned_groups(&self, profile_id: u32, banned: &BTreeSet<String>) -> Result<(), StorageError> {
        self.save_or_remove(&profile_key(profile_id, BANNED_GROUPS), banned, banned.is_empty())
            .await
    }

    pub async fn save_lately_added(
        &self,
        profile_id: u32,
        lately: &BTreeMap<NaiveDate, Vec<String>>,
    ) -> Result<(), StorageError> {
        let pairs: Vec<(&NaiveDate, &Vec<String>)> = lately.iter().collect();
        self.save_or_remove(&profile_key(profile_id, LATELY_ADDED), &pairs, pairs.is_empty())
            .await
    }

    /// Raw playlist text cached from the last download
    pub async fn load_cached_playlist(&self, profile_id: u32) -> Option<String> {
        let text: Option<String> = self
            .load_or_default(&profile_key(profile_id, CACHED_PLAYLIST))
            .await;
        text.filter(|t| !t.is_empty())
    }

    pub async fn save_cached_playlist(&self, profile_id: u32, text: &str) -> Result<(), StorageError> {
        self.save_or_remove(&profile_key(profile_id, CACHED_PLAYLIST), &text, text.is_empty())
            .await
    }

    pub async fn delete_profile_keys(&self, profile_id: u32) -> Result<(), StorageError> {
        for suffix in PROFILE_KEY_SUFFIXES {
            self.storage.remove(&profile_key(profile_id, suffix)).await?;
        }
        Ok(())
    }
}
