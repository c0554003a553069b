//! In-memory catalog of one profile.
//!
//! Watchables live in a single map keyed by URL. The group trees only hold
//! URLs, so an item is never duplicated and every list resolves through the
//! same record.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::errors::{CatalogError, CatalogResult};
use crate::models::{
    CatalogSummary, ClassifiedEntry, GroupCounts, GroupObject, GroupView, ListState, ViewNode,
    Viewable, WatchableKind, WatchableObject, WatchableView,
};

/// Group used for entries without a `group-title`
pub const UNGROUPED: &str = "Uncategorized";

/// Named top-level lists of a catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CatalogList {
    Movies,
    TvShows,
    LiveStreams,
    Recent,
    Favorites,
    Watched,
}

impl CatalogList {
    pub const ALL: [CatalogList; 6] = [
        CatalogList::Movies,
        CatalogList::TvShows,
        CatalogList::LiveStreams,
        CatalogList::Recent,
        CatalogList::Favorites,
        CatalogList::Watched,
    ];

    fn root(self) -> GroupObject {
        let (key, name, icon) = match self {
            CatalogList::Movies => ("movies", "Movies", "film"),
            CatalogList::TvShows => ("tv-shows", "Tv Shows", "tvShow"),
            CatalogList::LiveStreams => ("live-streams", "Live Streams", "livestream"),
            CatalogList::Recent => ("recent", "Recently Added", "clock"),
            CatalogList::Favorites => ("favorites", "Favorites", "heart"),
            CatalogList::Watched => ("watched", "Watched", "check"),
        };
        GroupObject::new(key, name, icon)
    }
}

/// Outcome of one `add_m3u_list` fold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldReport {
    pub added: usize,
    pub updated: usize,
    /// Entries dropped because their group is banned
    pub banned: usize,
}

/// User and bookkeeping state that outlives a reimport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogState {
    pub listed_items: BTreeMap<String, ListState>,
    pub pinned_groups: BTreeSet<String>,
    pub banned_groups: BTreeSet<String>,
    pub lately_added: BTreeMap<NaiveDate, Vec<String>>,
}

#[derive(Default)]
struct Tally {
    counts: GroupCounts,
    shows: HashSet<String>,
    seasons: HashSet<(String, u32)>,
}

impl Tally {
    fn merge(&mut self, other: Tally) {
        self.counts.total_count += other.counts.total_count;
        self.counts.movie_count += other.counts.movie_count;
        self.counts.live_stream_count += other.counts.live_stream_count;
        self.counts.tv_show_episode_count += other.counts.tv_show_episode_count;
        self.shows.extend(other.shows);
        self.seasons.extend(other.seasons);
    }

    fn finish(&self) -> GroupCounts {
        GroupCounts {
            tv_show_count: self.shows.len(),
            tv_show_season_count: self.seasons.len(),
            ..self.counts
        }
    }
}

/// Recompute counts bottom-up for a subtree
fn recount(group: &mut GroupObject, items: &HashMap<String, WatchableObject>) -> Tally {
    let mut tally = Tally::default();

    for url in &group.watchables {
        let Some(item) = items.get(url) else {
            continue;
        };
        tally.counts.total_count += 1;
        match &item.kind {
            WatchableKind::Movie => tally.counts.movie_count += 1,
            WatchableKind::LiveStream => tally.counts.live_stream_count += 1,
            WatchableKind::TvShow {
                show_name, season, ..
            } => {
                tally.counts.tv_show_episode_count += 1;
                tally.shows.insert(show_name.clone());
                tally.seasons.insert((show_name.clone(), *season));
            }
        }
    }

    for child in group.groups.iter_mut() {
        let child_tally = recount(child, items);
        tally.merge(child_tally);
    }

    group.counts = tally.finish();
    tally
}

struct SearchWalk<'a, 'w> {
    terms: &'w [String],
    token: &'w CancellationToken,
    seen: HashSet<&'a str>,
    found: Vec<WatchableObject>,
}

/// Label a source group is shown, pinned and banned under
fn label_of(group: &str) -> &str {
    if group.trim().is_empty() {
        UNGROUPED
    } else {
        group
    }
}

fn group_label(item: &WatchableObject) -> &str {
    label_of(&item.group)
}

fn season_key(show: &str, season: u32) -> String {
    format!("{}/Season {}", show, season)
}

/// Root list and group path an item belongs under
fn placement(item: &WatchableObject) -> (CatalogList, Vec<String>) {
    match &item.kind {
        WatchableKind::Movie => (CatalogList::Movies, vec![group_label(item).to_string()]),
        WatchableKind::LiveStream => (CatalogList::LiveStreams, vec![group_label(item).to_string()]),
        WatchableKind::TvShow {
            show_name, season, ..
        } => (
            CatalogList::TvShows,
            vec![show_name.clone(), season_key(show_name, *season)],
        ),
    }
}

fn matches_terms(name: &str, terms: &[String]) -> bool {
    let name = name.to_lowercase();
    terms.iter().all(|term| name.contains(term.as_str()))
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt))
}

/// Catalog tree of one profile
#[derive(Debug, Clone)]
pub struct Catalog {
    profile_id: u32,
    items: HashMap<String, WatchableObject>,
    movie_list: GroupObject,
    tv_show_list: GroupObject,
    live_stream_list: GroupObject,
    recently_added: GroupObject,
    watch_list: GroupObject,
    watched_list: GroupObject,
    state: CatalogState,
    /// Persisted user state has been read in
    restored: bool,
    is_loaded: bool,
}

impl Catalog {
    pub fn new(profile_id: u32) -> Self {
        Self {
            profile_id,
            items: HashMap::new(),
            movie_list: CatalogList::Movies.root(),
            tv_show_list: CatalogList::TvShows.root(),
            live_stream_list: CatalogList::LiveStreams.root(),
            recently_added: CatalogList::Recent.root(),
            watch_list: CatalogList::Favorites.root(),
            watched_list: CatalogList::Watched.root(),
            state: CatalogState::default(),
            restored: false,
            is_loaded: false,
        }
    }

    pub fn profile_id(&self) -> u32 {
        self.profile_id
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn state(&self) -> &CatalogState {
        &self.state
    }

    pub fn root(&self, list: CatalogList) -> &GroupObject {
        match list {
            CatalogList::Movies => &self.movie_list,
            CatalogList::TvShows => &self.tv_show_list,
            CatalogList::LiveStreams => &self.live_stream_list,
            CatalogList::Recent => &self.recently_added,
            CatalogList::Favorites => &self.watch_list,
            CatalogList::Watched => &self.watched_list,
        }
    }

    fn root_mut(&mut self, list: CatalogList) -> &mut GroupObject {
        match list {
            CatalogList::Movies => &mut self.movie_list,
            CatalogList::TvShows => &mut self.tv_show_list,
            CatalogList::LiveStreams => &mut self.live_stream_list,
            CatalogList::Recent => &mut self.recently_added,
            CatalogList::Favorites => &mut self.watch_list,
            CatalogList::Watched => &mut self.watched_list,
        }
    }

    /// Replace persisted user state and re-derive the list views from it
    pub fn restore(&mut self, state: CatalogState) {
        self.state = state;
        self.restored = true;
        self.apply_pins();
        self.rebuild_listed_views();
        self.recompute_counts();
    }

    pub fn find_by_url(&self, url: &str) -> Option<&WatchableObject> {
        self.items.get(url)
    }

    pub fn add_m3u_list(&mut self, entries: Vec<ClassifiedEntry>) -> FoldReport {
        self.add_m3u_list_at(entries, Utc::now())
    }

    /// Fold a batch of classified entries into the tree.
    ///
    /// A URL already in the catalog is updated in place, or moved when its
    /// list or group changed. URLs first seen while refreshing an already
    /// loaded catalog are recorded in `lately_added` under today's date.
    pub fn add_m3u_list_at(&mut self, entries: Vec<ClassifiedEntry>, now: DateTime<Utc>) -> FoldReport {
        let mut report = FoldReport::default();
        let refreshing = self.is_loaded;
        let today = now.date_naive();

        let added_on: HashMap<String, NaiveDate> = self
            .state
            .lately_added
            .iter()
            .flat_map(|(date, urls)| urls.iter().map(move |url| (url.clone(), *date)))
            .collect();
        let mut recent: HashSet<String> = self.recently_added.watchables.iter().cloned().collect();

        for classified in entries {
            // banned labels never enter the tree
            if self.state.banned_groups.contains(label_of(&classified.entry.group_title)) {
                report.banned += 1;
                continue;
            }

            let mut item = self.build_watchable(classified);
            let url = item.url.clone();

            let moved = self
                .items
                .get(&url)
                .map(|existing| placement(existing) != placement(&item));
            match moved {
                // seen before: same arena slot, re-filed if its list or group changed
                Some(moved) => {
                    if moved {
                        self.detach_from_type_lists(&url);
                        self.attach(&item);
                    }
                    report.updated += 1;
                }
                None => {
                    if refreshing && !added_on.contains_key(&url) {
                        self.state.lately_added.entry(today).or_default().push(url.clone());
                        item.view.added_date = Some(now);
                    }
                    self.attach(&item);
                    report.added += 1;
                }
            }

            // keep the first-seen date across refreshes
            if item.view.added_date.is_none() {
                item.view.added_date = added_on.get(&url).copied().and_then(start_of_day);
            }

            if recent.insert(url.clone()) {
                self.recently_added.watchables.push(url.clone());
            }
            self.items.insert(url, item);
        }

        if report.added + report.updated > 0 {
            self.is_loaded = true;
        }

        // new groups pick up pins and list state
        self.apply_pins();
        self.rebuild_listed_views();
        self.recompute_counts();

        tracing::debug!(
            profile_id = self.profile_id,
            added = report.added,
            updated = report.updated,
            banned = report.banned,
            "Folded playlist entries"
        );
        report
    }

    fn build_watchable(&self, classified: ClassifiedEntry) -> WatchableObject {
        let ClassifiedEntry {
            entry,
            is_live_stream,
            tv_show_info,
        } = classified;

        // markers win; the live flag stays on the record as a hint
        let kind = match (tv_show_info, is_live_stream) {
            (Some(info), _) => WatchableKind::TvShow {
                show_name: info.show_name,
                season: info.season,
                episode: info.episode,
            },
            (None, true) => WatchableKind::LiveStream,
            (None, false) => WatchableKind::Movie,
        };

        WatchableObject {
            view: Viewable {
                name: entry.name,
                logo: entry.logo,
                ..Default::default()
            },
            listed: self.state.listed_items.get(&entry.url).copied().unwrap_or_default(),
            url: entry.url,
            group: entry.group_title,
            possible_live_stream: is_live_stream,
            kind,
        }
    }

    fn attach(&mut self, item: &WatchableObject) {
        let (list, path) = placement(item);
        let mut group = self.root_mut(list);
        for (depth, key) in path.iter().enumerate() {
            let name = match (&item.kind, depth) {
                (WatchableKind::TvShow { season, .. }, 1) => format!("Season {}", season),
                _ => key.clone(),
            };
            group = group.child_mut_or_insert(key, &name, "");
            if group.view.logo.is_empty() {
                group.view.logo = item.view.logo.clone();
            }
        }
        group.watchables.push(item.url.clone());
    }

    fn detach_from_type_lists(&mut self, url: &str) {
        for list in [CatalogList::Movies, CatalogList::TvShows, CatalogList::LiveStreams] {
            self.root_mut(list).remove_url(url);
        }
    }

    /// Drop an item from every list; user annotations in `listed_items` stay
    fn remove_item(&mut self, url: &str) -> bool {
        if self.items.remove(url).is_none() {
            return false;
        }
        for list in CatalogList::ALL {
            self.root_mut(list).remove_url(url);
        }
        true
    }

    /// Remove every item whose URL is not in `keep`. Returns how many went.
    pub fn prune_missing(&mut self, keep: &HashSet<String>) -> usize {
        let stale: Vec<String> = self
            .items
            .keys()
            .filter(|url| !keep.contains(*url))
            .cloned()
            .collect();
        for url in &stale {
            self.remove_item(url);
        }
        if !stale.is_empty() {
            self.recompute_counts();
        }
        stale.len()
    }

    /// Drop `lately_added` dates older than `days` before `today`
    pub fn prune_lately_added(&mut self, today: NaiveDate, days: i64) -> usize {
        let cutoff = today - Duration::days(days);
        let before = self.state.lately_added.len();
        self.state.lately_added.retain(|date, _| *date >= cutoff);
        before - self.state.lately_added.len()
    }

    /// Move an item between the favorite and watched lists.
    /// Returns `false` when the item already had that state.
    pub fn set_watchable_list(&mut self, url: &str, state: ListState) -> CatalogResult<bool> {
        let item = self.items.get_mut(url).ok_or_else(|| CatalogError::ItemNotFound {
            url: url.to_string(),
        })?;
        if item.listed == state {
            return Ok(false);
        }
        let previous = std::mem::replace(&mut item.listed, state);

        match previous {
            ListState::Watch => {
                self.watch_list.remove_url(url);
            }
            ListState::Watched => {
                self.watched_list.remove_url(url);
            }
            ListState::None => {}
        }
        match state {
            ListState::Watch => self.watch_list.watchables.push(url.to_string()),
            ListState::Watched => self.watched_list.watchables.push(url.to_string()),
            ListState::None => {}
        }

        if state == ListState::None {
            self.state.listed_items.remove(url);
        } else {
            self.state.listed_items.insert(url.to_string(), state);
        }

        recount(&mut self.watch_list, &self.items);
        recount(&mut self.watched_list, &self.items);
        Ok(true)
    }

    /// Pin or unpin a group key. Returns `false` if nothing changed.
    pub fn set_group_pinned(&mut self, key: &str, pinned: bool) -> bool {
        let changed = if pinned {
            self.state.pinned_groups.insert(key.to_string())
        } else {
            self.state.pinned_groups.remove(key)
        };
        if changed {
            for list in CatalogList::ALL {
                self.root_mut(list).set_sticky(key, pinned);
            }
        }
        changed
    }

    /// Ban or unban a source group label. Banning removes its items now;
    /// unbanned items come back with the next import.
    pub fn set_group_banned(&mut self, key: &str, banned: bool) -> usize {
        if !banned {
            self.state.banned_groups.remove(key);
            return 0;
        }

        self.state.banned_groups.insert(key.to_string());
        // ungrouped items are banned under their shown label
        let doomed: Vec<String> = self
            .items
            .values()
            .filter(|item| group_label(item) == key)
            .map(|item| item.url.clone())
            .collect();
        for url in &doomed {
            self.remove_item(url);
        }
        self.recompute_counts();
        doomed.len()
    }

    /// Items whose name contains every space separated term, case-insensitive.
    /// Text with no terms matches nothing and returns an empty list.
    /// `None` when the token is cancelled before the walk finishes.
    pub fn search(&self, text: &str, token: &CancellationToken) -> Option<Vec<WatchableObject>> {
        self.search_observed(text, token, &mut |_| {})
    }

    /// `search`, calling `on_group` as the walk enters each group
    fn search_observed(
        &self,
        text: &str,
        token: &CancellationToken,
        on_group: &mut dyn FnMut(&GroupObject),
    ) -> Option<Vec<WatchableObject>> {
        let terms: Vec<String> = text
            .to_lowercase()
            .split(' ')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if terms.is_empty() {
            return Some(Vec::new());
        }

        let mut walk = SearchWalk {
            terms: &terms,
            token,
            seen: HashSet::new(),
            found: Vec::new(),
        };
        for list in [CatalogList::Movies, CatalogList::TvShows, CatalogList::LiveStreams] {
            if !self.search_group(self.root(list), &mut walk, on_group) {
                return None;
            }
        }
        Some(walk.found)
    }

    fn search_group<'a>(
        &'a self,
        group: &'a GroupObject,
        walk: &mut SearchWalk<'a, '_>,
        on_group: &mut dyn FnMut(&GroupObject),
    ) -> bool {
        on_group(group);
        // checked once per group so a superseded search stops early
        if walk.token.is_cancelled() {
            return false;
        }
        for url in &group.watchables {
            if let Some(item) = self.items.get(url) {
                // an item reachable from two lists is reported once
                if matches_terms(&item.view.name, walk.terms) && walk.seen.insert(url.as_str()) {
                    walk.found.push(item.clone());
                }
            }
        }
        group
            .groups
            .iter()
            .all(|child| self.search_group(child, walk, on_group))
    }

    fn apply_pins(&mut self) {
        let pinned: Vec<String> = self.state.pinned_groups.iter().cloned().collect();
        for key in &pinned {
            for list in CatalogList::ALL {
                self.root_mut(list).set_sticky(key, true);
            }
        }
    }

    /// Make the favorite/watched lists and each item's `listed` agree with `listed_items`
    fn rebuild_listed_views(&mut self) {
        for item in self.items.values_mut() {
            item.listed = self.state.listed_items.get(&item.url).copied().unwrap_or_default();
        }

        let mut watch = Vec::new();
        let mut watched = Vec::new();
        for (url, state) in &self.state.listed_items {
            if !self.items.contains_key(url) {
                continue;
            }
            match state {
                ListState::Watch => watch.push(url.clone()),
                ListState::Watched => watched.push(url.clone()),
                ListState::None => {}
            }
        }
        self.watch_list.watchables = watch;
        self.watched_list.watchables = watched;
    }

    fn recompute_counts(&mut self) {
        recount(&mut self.movie_list, &self.items);
        recount(&mut self.tv_show_list, &self.items);
        recount(&mut self.live_stream_list, &self.items);
        recount(&mut self.recently_added, &self.items);
        recount(&mut self.watch_list, &self.items);
        recount(&mut self.watched_list, &self.items);
    }

    /// Counts across the three type lists
    pub fn counts(&self) -> GroupCounts {
        let mut total = GroupCounts::default();
        for list in [CatalogList::Movies, CatalogList::TvShows, CatalogList::LiveStreams] {
            let c = self.root(list).counts;
            total.total_count += c.total_count;
            total.movie_count += c.movie_count;
            total.tv_show_count += c.tv_show_count;
            total.live_stream_count += c.live_stream_count;
            total.tv_show_season_count += c.tv_show_season_count;
            total.tv_show_episode_count += c.tv_show_episode_count;
        }
        total
    }

    /// Number of first-level groups across the three type lists
    pub fn group_count(&self) -> usize {
        self.movie_list.groups.len() + self.tv_show_list.groups.len() + self.live_stream_list.groups.len()
    }

    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary {
            profile_id: self.profile_id,
            is_loaded: self.is_loaded,
            group_count: self.group_count(),
            counts: self.counts(),
            favorites: self.watch_list.watchables.len(),
            watched: self.watched_list.watchables.len(),
            recently_added: self.recently_added.watchables.len(),
        }
    }

    /// Resolved snapshot of one list with presentation hints
    pub fn view(&self, list: CatalogList, now: DateTime<Utc>) -> GroupView {
        self.group_view(self.root(list), now)
    }

    fn group_view(&self, group: &GroupObject, now: DateTime<Utc>) -> GroupView {
        let node = ViewNode::Group(group);
        GroupView {
            key: group.key.clone(),
            name: node.viewable().name.clone(),
            title: node.title(),
            title_icon: node.title_icon().to_string(),
            is_sticky: group.view.is_sticky,
            counts: group.counts,
            groups: group
                .ordered_groups()
                .into_iter()
                .map(|child| self.group_view(child, now))
                .collect(),
            items: group
                .watchables
                .iter()
                .filter_map(|url| self.items.get(url))
                .map(|item| WatchableView::new(item, now))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParsedEntry;
    use crate::services::classifier::ContentClassifier;

    fn entry(name: &str, url: &str, group: &str) -> ClassifiedEntry {
        ContentClassifier::classify(ParsedEntry {
            name: name.to_string(),
            url: url.to_string(),
            logo: String::new(),
            group_title: group.to_string(),
            attributes: Vec::new(),
        })
    }

    fn sample() -> Vec<ClassifiedEntry> {
        vec![
            entry("Matrix (1999)", "http://x/matrix.mp4", "Movies"),
            entry("Show S01E01", "http://x/s1e1.mkv", "Series"),
            entry("Show S01E02", "http://x/s1e2.mkv", "Series"),
            entry("Show S02E01", "http://x/s2e1.mkv", "Series"),
            entry("Other S01E01", "http://x/o1.mkv", "Series"),
            entry("News 24", "http://x/live/1", "Channels"),
        ]
    }

    #[test]
    fn test_extensionless_episode_routes_to_tv_shows() {
        let mut catalog = Catalog::new(1);
        let classified = ContentClassifier::classify(ParsedEntry {
            name: "Show S02E05".to_string(),
            url: "http://x/y".to_string(),
            logo: "L".to_string(),
            group_title: "G".to_string(),
            attributes: Vec::new(),
        });
        let info = classified.tv_show_info.clone().unwrap();
        assert_eq!((info.show_name.as_str(), info.season, info.episode), ("Show", 2, 5));

        let report = catalog.add_m3u_list(vec![classified]);
        assert_eq!(report.added, 1);
        assert!(catalog.is_loaded());
        assert!(catalog.root(CatalogList::TvShows).contains_url("http://x/y"));
        assert!(!catalog.root(CatalogList::LiveStreams).contains_url("http://x/y"));
        let item = catalog.find_by_url("http://x/y").unwrap();
        assert_eq!(item.view.logo, "L");
        assert_eq!(item.group, "G");
        // still flagged, only as a presentation hint
        assert!(item.possible_live_stream);
        assert_eq!(item.title(), "Tv Shows");
    }

    #[test]
    fn test_extensionless_url_without_markers_routes_to_live_streams() {
        let mut catalog = Catalog::new(1);
        catalog.add_m3u_list(vec![entry("News 24", "http://x/live/1", "Channels")]);
        assert!(catalog.root(CatalogList::LiveStreams).contains_url("http://x/live/1"));
    }

    #[test]
    fn test_episode_file_routes_to_tv_shows() {
        let mut catalog = Catalog::new(1);
        catalog.add_m3u_list(vec![entry("Show S02E05", "http://x/y.mkv", "G")]);

        let season = catalog
            .root(CatalogList::TvShows)
            .child("Show")
            .and_then(|show| show.child(&season_key("Show", 2)))
            .unwrap();
        assert_eq!(season.view.name, "Season 2");
        assert_eq!(season.watchables, vec!["http://x/y.mkv".to_string()]);
        match &catalog.find_by_url("http://x/y.mkv").unwrap().kind {
            WatchableKind::TvShow { episode, .. } => assert_eq!(*episode, 5),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_fold_routes_and_counts() {
        let mut catalog = Catalog::new(1);
        catalog.add_m3u_list(sample());

        let counts = catalog.counts();
        assert_eq!(counts.total_count, 6);
        assert_eq!(counts.movie_count, 1);
        assert_eq!(counts.live_stream_count, 1);
        assert_eq!(counts.tv_show_episode_count, 4);
        assert_eq!(counts.tv_show_count, 2);
        assert_eq!(counts.tv_show_season_count, 3);
        assert_eq!(
            counts.total_count,
            catalog.root(CatalogList::Movies).counts.total_count
                + catalog.root(CatalogList::TvShows).counts.total_count
                + catalog.root(CatalogList::LiveStreams).counts.total_count
        );

        let show = catalog.root(CatalogList::TvShows).child("Show").unwrap();
        assert_eq!(show.groups.len(), 2);
        assert_eq!(show.groups[0].view.name, "Season 1");
        assert_eq!(show.groups[0].watchables.len(), 2);
        assert_eq!(catalog.root(CatalogList::Recent).watchables.len(), 6);
        assert_eq!(catalog.group_count(), 4);
    }

    #[test]
    fn test_same_url_is_updated_in_place() {
        let mut catalog = Catalog::new(1);
        catalog.add_m3u_list(vec![entry("Old Name", "http://x/a.mp4", "G")]);
        let report = catalog.add_m3u_list(vec![entry("New Name", "http://x/a.mp4", "G")]);

        assert_eq!(report.updated, 1);
        assert_eq!(catalog.len(), 1);
        let movies = catalog.root(CatalogList::Movies);
        assert_eq!(movies.all_urls(), vec!["http://x/a.mp4"]);
        assert_eq!(catalog.find_by_url("http://x/a.mp4").unwrap().view.name, "New Name");
        assert_eq!(catalog.root(CatalogList::Recent).watchables.len(), 1);
    }

    #[test]
    fn test_duplicate_in_one_batch_keeps_last() {
        let mut catalog = Catalog::new(1);
        catalog.add_m3u_list(vec![
            entry("First", "http://x/a.mp4", "G"),
            entry("Second", "http://x/a.mp4", "G"),
        ]);
        assert_eq!(catalog.counts().total_count, 1);
        assert_eq!(catalog.find_by_url("http://x/a.mp4").unwrap().view.name, "Second");
    }

    #[test]
    fn test_changed_group_moves_item() {
        let mut catalog = Catalog::new(1);
        catalog.add_m3u_list(vec![entry("A", "http://x/a.mp4", "Old")]);
        catalog.add_m3u_list(vec![entry("A S01E01", "http://x/a.mp4", "New")]);

        assert!(catalog.root(CatalogList::Movies).groups.is_empty());
        assert!(catalog.root(CatalogList::TvShows).contains_url("http://x/a.mp4"));
        assert_eq!(catalog.counts().movie_count, 0);
        assert_eq!(catalog.counts().tv_show_episode_count, 1);
    }

    #[test]
    fn test_empty_batch_does_not_mark_loaded() {
        let mut catalog = Catalog::new(1);
        catalog.add_m3u_list(Vec::new());
        assert!(!catalog.is_loaded());
    }

    #[test]
    fn test_user_state_round_trip() {
        let mut catalog = Catalog::new(1);
        catalog.add_m3u_list(sample());
        let url = "http://x/matrix.mp4";

        assert!(catalog.set_watchable_list(url, ListState::Watch).unwrap());
        assert!(!catalog.set_watchable_list(url, ListState::Watch).unwrap());
        assert_eq!(catalog.root(CatalogList::Favorites).watchables, vec![url.to_string()]);
        assert_eq!(catalog.state().listed_items.get(url), Some(&ListState::Watch));

        assert!(catalog.set_watchable_list(url, ListState::Watched).unwrap());
        assert!(catalog.root(CatalogList::Favorites).watchables.is_empty());
        assert_eq!(catalog.root(CatalogList::Watched).counts.total_count, 1);

        assert!(catalog.set_watchable_list(url, ListState::None).unwrap());
        assert!(!catalog.state().listed_items.contains_key(url));
        assert!(catalog.root(CatalogList::Favorites).watchables.is_empty());
        assert!(catalog.root(CatalogList::Watched).watchables.is_empty());
        assert_eq!(catalog.find_by_url(url).unwrap().listed, ListState::None);
    }

    #[test]
    fn test_set_watchable_list_unknown_url() {
        let mut catalog = Catalog::new(1);
        let err = catalog.set_watchable_list("http://nope", ListState::Watch).unwrap_err();
        assert!(matches!(err, CatalogError::ItemNotFound { .. }));
    }

    #[test]
    fn test_restore_reapplies_listed_items() {
        let mut state = CatalogState::default();
        state.listed_items.insert("http://x/matrix.mp4".to_string(), ListState::Watched);
        state.listed_items.insert("http://gone".to_string(), ListState::Watch);

        let mut catalog = Catalog::new(1);
        catalog.restore(state);
        catalog.add_m3u_list(sample());

        assert_eq!(
            catalog.find_by_url("http://x/matrix.mp4").unwrap().listed,
            ListState::Watched
        );
        assert_eq!(catalog.root(CatalogList::Watched).watchables.len(), 1);
        assert!(catalog.root(CatalogList::Favorites).watchables.is_empty());
        // annotations for missing items are kept
        assert_eq!(catalog.state().listed_items.len(), 2);
    }

    #[test]
    fn test_search() {
        let mut catalog = Catalog::new(1);
        catalog.add_m3u_list(sample());
        let token = CancellationToken::new();

        let found = catalog.search("show s01", &token).unwrap();
        let names: Vec<&str> = found.iter().map(|i| i.view.name.as_str()).collect();
        assert_eq!(names, vec!["Show S01E01", "Show S01E02"]);

        assert!(catalog.search("  ", &token).unwrap().is_empty());

        token.cancel();
        assert!(catalog.search("show", &token).is_none());
    }

    #[test]
    fn test_search_stops_when_cancelled_mid_walk() {
        let mut catalog = Catalog::new(1);
        catalog.add_m3u_list(sample());
        let token = CancellationToken::new();

        let mut entered = Vec::new();
        let found = catalog.search_observed("s01", &token, &mut |group| entered.push(group.key.clone()));
        assert_eq!(found.map(|items| items.len()), Some(3));
        assert!(entered.contains(&"Show".to_string()));

        let mut entered = Vec::new();
        let found = catalog.search_observed("s01", &token, &mut |group| {
            entered.push(group.key.clone());
            if group.key == "Show" {
                token.cancel();
            }
        });
        assert!(found.is_none());
        // nothing after the show group is visited
        assert_eq!(entered.last().map(String::as_str), Some("Show"));
    }

    #[test]
    fn test_pinned_groups_sort_first() {
        let mut catalog = Catalog::new(1);
        catalog.add_m3u_list(vec![
            entry("A", "http://x/a.mp4", "First"),
            entry("B", "http://x/b.mp4", "Second"),
        ]);
        assert!(catalog.set_group_pinned("Second", true));
        assert!(!catalog.set_group_pinned("Second", true));

        let view = catalog.view(CatalogList::Movies, Utc::now());
        assert_eq!(view.groups[0].key, "Second");
        assert!(view.groups[0].is_sticky);

        // groups created later pick up the pin
        catalog.add_m3u_list(vec![entry("C", "http://x/c.mp4", "Second")]);
        assert!(catalog.root(CatalogList::Movies).child("Second").unwrap().view.is_sticky);
    }

    #[test]
    fn test_banned_groups_are_removed_and_skipped() {
        let mut catalog = Catalog::new(1);
        catalog.add_m3u_list(sample());
        catalog.set_watchable_list("http://x/live/1", ListState::Watch).unwrap();

        assert_eq!(catalog.set_group_banned("Channels", true), 1);
        assert!(catalog.find_by_url("http://x/live/1").is_none());
        assert_eq!(catalog.counts().live_stream_count, 0);
        assert!(catalog.root(CatalogList::Favorites).watchables.is_empty());

        let report = catalog.add_m3u_list(sample());
        assert_eq!(report.banned, 1);
        assert!(catalog.find_by_url("http://x/live/1").is_none());

        catalog.set_group_banned("Channels", false);
        catalog.add_m3u_list(sample());
        assert!(catalog.find_by_url("http://x/live/1").is_some());
    }

    #[test]
    fn test_ban_ungrouped_label() {
        let mut catalog = Catalog::new(1);
        let loose = vec![
            entry("Loose", "http://x/loose.mp4", ""),
            entry("Kept", "http://x/kept.mp4", "Movies"),
        ];
        catalog.add_m3u_list(loose.clone());
        assert!(catalog.root(CatalogList::Movies).child(UNGROUPED).is_some());

        assert_eq!(catalog.set_group_banned(UNGROUPED, true), 1);
        assert!(catalog.find_by_url("http://x/loose.mp4").is_none());
        assert!(catalog.root(CatalogList::Movies).child(UNGROUPED).is_none());

        let report = catalog.add_m3u_list(loose);
        assert_eq!(report.banned, 1);
        assert!(catalog.find_by_url("http://x/loose.mp4").is_none());
        assert!(catalog.find_by_url("http://x/kept.mp4").is_some());
    }

    #[test]
    fn test_prune_missing() {
        let mut catalog = Catalog::new(1);
        catalog.add_m3u_list(sample());
        let keep: HashSet<String> = ["http://x/matrix.mp4".to_string()].into_iter().collect();

        assert_eq!(catalog.prune_missing(&keep), 5);
        assert_eq!(catalog.counts().total_count, 1);
        assert!(catalog.root(CatalogList::TvShows).groups.is_empty());
        assert_eq!(catalog.root(CatalogList::Recent).watchables.len(), 1);
    }

    #[test]
    fn test_lately_added_only_on_refresh() {
        let now = Utc::now();
        let mut catalog = Catalog::new(1);
        catalog.add_m3u_list_at(sample(), now);
        assert!(catalog.state().lately_added.is_empty());

        catalog.add_m3u_list_at(
            vec![entry("Fresh (2024)", "http://x/fresh.mp4", "Movies")],
            now,
        );
        let dates: Vec<&NaiveDate> = catalog.state().lately_added.keys().collect();
        assert_eq!(dates, vec![&now.date_naive()]);

        let fresh = catalog.find_by_url("http://x/fresh.mp4").unwrap();
        assert!(fresh.is_hot());
        assert!(!catalog.find_by_url("http://x/matrix.mp4").unwrap().is_hot());

        let later = now.date_naive() + Duration::days(30);
        assert_eq!(catalog.prune_lately_added(later, 14), 1);
        assert!(catalog.state().lately_added.is_empty());
    }

    #[test]
    fn test_view_resolves_items() {
        let mut catalog = Catalog::new(1);
        catalog.add_m3u_list(sample());
        let view = catalog.view(CatalogList::LiveStreams, Utc::now());

        assert_eq!(view.title, "Group");
        assert_eq!(view.title_icon, "livestream");
        assert_eq!(view.groups.len(), 1);
        let item = &view.groups[0].items[0];
        assert_eq!(item.title, "Live Stream");
        assert_eq!(item.list_icon, "");
    }
}
