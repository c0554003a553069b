//! Profile registry and per-profile catalogs.
//!
//! One `IptvManager` is built at startup and shared through `AppState`. Loads
//! are serialized per profile: a second load while one is running fails with
//! `LoadInProgress`. Only the newest search of a profile runs to completion;
//! starting a search cancels the previous one on the same profile.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::errors::{CatalogError, CatalogResult, StorageError};
use crate::models::{CatalogSummary, GroupView, ListState, ManagerSettings, Profile, WatchableObject};
use crate::services::catalog::{Catalog, CatalogList};
use crate::services::catalog_store::CatalogStore;
use crate::services::classifier::ContentClassifier;
use crate::services::fetch::Fetcher;
use crate::services::m3u_parser::M3UParser;
use crate::services::notify::{Notifier, NotifyKind};
use crate::services::storage::{Storage, StorageExt};

pub const PROFILES_KEY: &str = "profiles";
pub const SETTINGS_KEY: &str = "iptvConfig";

/// Percentage step between parse progress notifications
const PARSE_PROGRESS_STEP: f32 = 10.0;

/// Marks a profile as loading until dropped
struct LoadGuard<'a> {
    loading: &'a StdMutex<HashSet<u32>>,
    id: u32,
}

impl<'a> LoadGuard<'a> {
    fn acquire(loading: &'a StdMutex<HashSet<u32>>, id: u32) -> CatalogResult<Self> {
        let mut set = loading.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(id) {
            return Err(CatalogError::LoadInProgress { id });
        }
        Ok(Self { loading, id })
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        let mut set = self.loading.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.id);
    }
}

fn validate_url(url: &str) -> CatalogResult<()> {
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(CatalogError::InvalidUrl {
            url: url.to_string(),
        }),
    }
}

pub struct IptvManager {
    storage: Arc<dyn Storage>,
    store: CatalogStore,
    fetcher: Arc<dyn Fetcher>,
    parser: M3UParser,
    lately_added_days: i64,
    profiles: RwLock<BTreeMap<u32, Profile>>,
    settings: RwLock<ManagerSettings>,
    catalogs: RwLock<HashMap<u32, Arc<Mutex<Catalog>>>>,
    loading: StdMutex<HashSet<u32>>,
    searches: StdMutex<HashMap<u32, CancellationToken>>,
}

impl IptvManager {
    /// Read the profile registry and settings from storage
    pub async fn open(
        storage: Arc<dyn Storage>,
        fetcher: Arc<dyn Fetcher>,
        lately_added_days: i64,
    ) -> Self {
        let profiles: Vec<Profile> = match storage.get_json(PROFILES_KEY).await {
            Ok(profiles) => profiles.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Could not read saved profiles, starting empty: {}", e);
                Vec::new()
            }
        };
        let settings: ManagerSettings = match storage.get_json(SETTINGS_KEY).await {
            Ok(settings) => settings.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Could not read saved settings, using defaults: {}", e);
                ManagerSettings::default()
            }
        };

        tracing::info!(
            profiles = profiles.len(),
            backend = storage.backend(),
            "Profile registry opened"
        );

        Self {
            store: CatalogStore::new(storage.clone()),
            storage,
            fetcher,
            parser: M3UParser::with_progress_step(PARSE_PROGRESS_STEP),
            lately_added_days,
            profiles: RwLock::new(profiles.into_iter().map(|p| (p.id, p)).collect()),
            settings: RwLock::new(settings),
            catalogs: RwLock::new(HashMap::new()),
            loading: StdMutex::new(HashSet::new()),
            searches: StdMutex::new(HashMap::new()),
        }
    }

    /// Cancel outstanding work and flush settings
    pub async fn shutdown(&self) {
        self.cancel_search();
        let settings = self.settings.read().await.clone();
        if let Err(e) = self.storage.set_json(SETTINGS_KEY, &settings).await {
            tracing::warn!("Failed to save settings on shutdown: {}", e);
        }
        self.catalogs.write().await.clear();
        tracing::info!("Manager shut down");
    }

    pub fn storage_backend(&self) -> &'static str {
        self.storage.backend()
    }

    /// True when the storage backend answers a read
    pub async fn storage_healthy(&self) -> bool {
        self.storage.exists(PROFILES_KEY).await.is_ok()
    }

    // ============ Profiles ============

    async fn persist_profiles(&self, profiles: &BTreeMap<u32, Profile>) -> Result<(), StorageError> {
        let list: Vec<&Profile> = profiles.values().collect();
        self.storage.set_json(PROFILES_KEY, &list).await
    }

    async fn persist_settings(&self, settings: &ManagerSettings) -> Result<(), StorageError> {
        self.storage.set_json(SETTINGS_KEY, settings).await
    }

    pub async fn list_profiles(&self) -> Vec<Profile> {
        self.profiles.read().await.values().cloned().collect()
    }

    pub async fn find_profile(&self, id: u32) -> CatalogResult<Profile> {
        self.profiles
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(CatalogError::ProfileNotFound { id })
    }

    /// Register a playlist URL. Ids are one more than the current maximum.
    pub async fn add_profile(&self, url: &str, name: Option<&str>) -> CatalogResult<Profile> {
        let url = url.trim();
        validate_url(url)?;

        let mut profiles = self.profiles.write().await;
        if profiles.values().any(|p| p.url == url) {
            return Err(CatalogError::DuplicateProfile {
                url: url.to_string(),
            });
        }

        let id = profiles.keys().next_back().map_or(1, |max| max + 1);
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let profile = Profile::new(id, url, name);
        profiles.insert(id, profile.clone());
        self.persist_profiles(&profiles).await?;

        tracing::info!(profile_id = id, "Profile added");
        Ok(profile)
    }

    pub async fn update_profile(&self, id: u32, name: &str) -> CatalogResult<Profile> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles.get_mut(&id).ok_or(CatalogError::ProfileNotFound { id })?;
        profile.name = name.trim().to_string();
        let updated = profile.clone();
        self.persist_profiles(&profiles).await?;
        Ok(updated)
    }

    /// Remove a profile, its persisted catalog keys and its in-memory catalog
    pub async fn delete_profile(&self, id: u32) -> CatalogResult<()> {
        {
            let mut profiles = self.profiles.write().await;
            if profiles.remove(&id).is_none() {
                return Err(CatalogError::ProfileNotFound { id });
            }
            self.persist_profiles(&profiles).await?;
        }

        self.store.delete_profile_keys(id).await?;
        self.catalogs.write().await.remove(&id);

        let mut settings = self.settings.write().await;
        if settings.last_profile_id == Some(id) {
            settings.last_profile_id = None;
            self.persist_settings(&settings).await?;
        }

        tracing::info!(profile_id = id, "Profile deleted");
        Ok(())
    }

    pub async fn settings(&self) -> ManagerSettings {
        self.settings.read().await.clone()
    }

    pub async fn set_load_last_profile(&self, enabled: bool) -> CatalogResult<ManagerSettings> {
        let mut settings = self.settings.write().await;
        settings.load_last_profile = enabled;
        self.persist_settings(&settings).await?;
        Ok(settings.clone())
    }

    /// Profile to reopen at startup, if enabled and still registered
    pub async fn last_loaded_profile(&self) -> Option<Profile> {
        let settings = self.settings.read().await.clone();
        if !settings.load_last_profile {
            return None;
        }
        let id = settings.last_profile_id?;
        self.profiles.read().await.get(&id).cloned()
    }

    // ============ Catalogs ============

    async fn catalog_handle(&self, id: u32) -> Arc<Mutex<Catalog>> {
        if let Some(handle) = self.catalogs.read().await.get(&id) {
            return handle.clone();
        }
        self.catalogs
            .write()
            .await
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(Catalog::new(id))))
            .clone()
    }

    /// Populate a profile's catalog.
    ///
    /// Returns early when already loaded unless `force_reload`. Otherwise
    /// reads the cached playlist text (skipped on force reload) or downloads
    /// it, then parses, classifies and folds it. On a forced reload items that
    /// disappeared from the playlist are pruned. A failed download leaves the
    /// current catalog untouched.
    pub async fn load_catalog(
        &self,
        id: u32,
        force_reload: bool,
        notifier: &dyn Notifier,
    ) -> CatalogResult<CatalogSummary> {
        let profile = self.find_profile(id).await?;
        let _guard = LoadGuard::acquire(&self.loading, id)?;
        let handle = self.catalog_handle(id).await;

        let was_loaded = handle.lock().await.is_loaded();
        if was_loaded && !force_reload {
            return Ok(handle.lock().await.summary());
        }

        let cached = if force_reload {
            None
        } else {
            self.store.load_cached_playlist(id).await
        };
        let downloaded = cached.is_none();
        let text = match cached {
            Some(text) => {
                notifier.notify("Using cached playlist", NotifyKind::Info);
                text
            }
            None => {
                notifier.notify(&format!("Downloading {}", profile.name), NotifyKind::Info);
                match self.fetcher.fetch_text(&profile.url).await {
                    Ok(text) => text,
                    Err(e) => {
                        notifier.notify(&format!("Download failed: {}", e), NotifyKind::Error);
                        return Err(e.into());
                    }
                }
            }
        };

        let report = self.parser.parse_with_progress(&text, &mut |percent| {
            notifier.notify(&format!("Parsing {:.0}%", percent), NotifyKind::Info)
        })?;
        // only text that parsed is worth caching
        if downloaded {
            if let Err(e) = self.store.save_cached_playlist(id, &text).await {
                tracing::warn!(profile_id = id, "Could not cache playlist text: {}", e);
            }
        }
        if report.skipped > 0 {
            notifier.notify(
                &format!("Skipped {} malformed entries", report.skipped),
                NotifyKind::Warning,
            );
        }
        let entries = ContentClassifier::classify_all(report.entries);

        let now = Utc::now();
        let (summary, counts, group_count, lately_added) = {
            let mut catalog = handle.lock().await;
            self.ensure_restored(id, &mut catalog).await;
            catalog.prune_lately_added(now.date_naive(), self.lately_added_days);

            if was_loaded {
                let keep: HashSet<String> = entries.iter().map(|e| e.entry.url.clone()).collect();
                let pruned = catalog.prune_missing(&keep);
                if pruned > 0 {
                    tracing::info!(profile_id = id, pruned, "Removed items missing from playlist");
                }
            }
            catalog.add_m3u_list_at(entries, now);

            (
                catalog.summary(),
                catalog.counts(),
                catalog.group_count(),
                catalog.state().lately_added.clone(),
            )
        };

        if let Err(e) = self.store.save_lately_added(id, &lately_added).await {
            tracing::warn!(profile_id = id, "Could not save lately added: {}", e);
        }
        self.record_load(id, &counts, group_count, now).await;

        notifier.notify(
            &format!("Loaded {} items", summary.counts.total_count),
            NotifyKind::Success,
        );
        tracing::info!(profile_id = id, total = summary.counts.total_count, "Catalog loaded");
        Ok(summary)
    }

    async fn record_load(
        &self,
        id: u32,
        counts: &crate::models::GroupCounts,
        group_count: usize,
        now: DateTime<Utc>,
    ) {
        {
            let mut profiles = self.profiles.write().await;
            if let Some(profile) = profiles.get_mut(&id) {
                profile.apply_counts(counts, group_count);
                profile.updated_date = now.timestamp_millis();
            }
            if let Err(e) = self.persist_profiles(&profiles).await {
                tracing::warn!(profile_id = id, "Could not save profile counts: {}", e);
            }
        }

        let mut settings = self.settings.write().await;
        settings.last_profile_id = Some(id);
        if let Err(e) = self.persist_settings(&settings).await {
            tracing::warn!("Could not save settings: {}", e);
        }
    }

    /// Read persisted user state into a catalog the first time it is needed,
    /// so changes made before a load extend the stored state.
    async fn ensure_restored(&self, id: u32, catalog: &mut Catalog) {
        if !catalog.is_restored() {
            catalog.restore(self.store.load_state(id).await);
        }
    }

    /// Run `f` against a profile's catalog, empty if never loaded
    pub async fn with_catalog<R>(&self, id: u32, f: impl FnOnce(&Catalog) -> R) -> CatalogResult<R> {
        self.find_profile(id).await?;
        let handle = self.catalog_handle(id).await;
        let catalog = handle.lock().await;
        Ok(f(&catalog))
    }

    pub async fn summary(&self, id: u32) -> CatalogResult<CatalogSummary> {
        self.with_catalog(id, |c| c.summary()).await
    }

    pub async fn view(&self, id: u32, list: CatalogList) -> CatalogResult<GroupView> {
        let now = Utc::now();
        self.with_catalog(id, |c| c.view(list, now)).await
    }

    pub async fn find_by_url(&self, id: u32, url: &str) -> CatalogResult<Option<WatchableObject>> {
        self.with_catalog(id, |c| c.find_by_url(url).cloned()).await
    }

    /// Change an item's list state and persist `listedItems`.
    /// A failed write is returned so the caller knows the change may not stick.
    pub async fn set_watchable_list(&self, id: u32, url: &str, state: ListState) -> CatalogResult<bool> {
        self.find_profile(id).await?;
        let handle = self.catalog_handle(id).await;
        let mut catalog = handle.lock().await;
        self.ensure_restored(id, &mut catalog).await;

        let changed = catalog.set_watchable_list(url, state)?;
        if changed {
            self.store
                .save_listed_items(id, &catalog.state().listed_items)
                .await?;
        }
        Ok(changed)
    }

    pub async fn set_group_pinned(&self, id: u32, key: &str, pinned: bool) -> CatalogResult<bool> {
        self.find_profile(id).await?;
        let handle = self.catalog_handle(id).await;
        let mut catalog = handle.lock().await;
        self.ensure_restored(id, &mut catalog).await;

        let changed = catalog.set_group_pinned(key, pinned);
        if changed {
            self.store
                .save_pinned_groups(id, &catalog.state().pinned_groups)
                .await?;
        }
        Ok(changed)
    }

    /// Ban or unban a group. Returns how many items were removed.
    pub async fn set_group_banned(&self, id: u32, key: &str, banned: bool) -> CatalogResult<usize> {
        self.find_profile(id).await?;
        let handle = self.catalog_handle(id).await;
        let mut catalog = handle.lock().await;
        self.ensure_restored(id, &mut catalog).await;

        let removed = catalog.set_group_banned(key, banned);
        self.store
            .save_banned_groups(id, &catalog.state().banned_groups)
            .await?;
        Ok(removed)
    }

    // ============ Search ============

    fn begin_search(&self, id: u32) -> CancellationToken {
        let token = CancellationToken::new();
        let mut searches = self.searches.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = searches.insert(id, token.clone()) {
            previous.cancel();
        }
        token
    }

    /// Cancel the running search of every profile
    pub fn cancel_search(&self) {
        let mut searches = self.searches.lock().unwrap_or_else(|e| e.into_inner());
        for (_, token) in searches.drain() {
            token.cancel();
        }
    }

    /// Search a profile's catalog. `None` means a newer search on the same
    /// profile superseded this one.
    pub async fn start_search(&self, id: u32, text: &str) -> CatalogResult<Option<Vec<WatchableObject>>> {
        let token = self.begin_search(id);
        self.with_catalog(id, |c| c.search(text, &token)).await
    }
}
