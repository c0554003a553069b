use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::playlist::MediaKind;

/// List membership of a watchable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListState {
    None,
    Watch,
    Watched,
}

impl Default for ListState {
    fn default() -> Self {
        Self::None
    }
}

impl ListState {
    pub fn list_icon(&self) -> &'static str {
        match self {
            ListState::Watch => "heart",
            ListState::Watched => "check",
            ListState::None => "",
        }
    }
}

/// Fields shared by every node of the catalog tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewable {
    pub name: String,
    pub logo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_date: Option<DateTime<Utc>>,
    /// Fraction of the logo that loaded, used by the UI for fallbacks
    pub logo_percent: f32,
    /// Pinned at the top regardless of sort
    pub is_sticky: bool,
}

impl Viewable {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Aggregate counts of a group, derived from its children
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCounts {
    pub total_count: usize,
    pub movie_count: usize,
    pub tv_show_count: usize,
    pub live_stream_count: usize,
    pub tv_show_season_count: usize,
    pub tv_show_episode_count: usize,
}

/// A group node. Watchables are referenced by URL; the catalog owns the records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupObject {
    #[serde(flatten)]
    pub view: Viewable,
    /// Key used for pinning/banning and for lookup among siblings
    pub key: String,
    pub icon: String,
    pub groups: Vec<GroupObject>,
    pub watchables: Vec<String>,
    pub counts: GroupCounts,
}

impl GroupObject {
    pub fn new(key: &str, name: &str, icon: &str) -> Self {
        Self {
            view: Viewable::named(name),
            key: key.to_string(),
            icon: icon.to_string(),
            ..Default::default()
        }
    }

    pub fn child(&self, key: &str) -> Option<&GroupObject> {
        self.groups.iter().find(|g| g.key == key)
    }

    /// Find or create a child group, keeping discovery order
    pub fn child_mut_or_insert(&mut self, key: &str, name: &str, icon: &str) -> &mut GroupObject {
        let index = match self.groups.iter().position(|g| g.key == key) {
            Some(index) => index,
            None => {
                self.groups.push(GroupObject::new(key, name, icon));
                self.groups.len() - 1
            }
        };
        &mut self.groups[index]
    }

    /// Child groups with sticky ones first, otherwise in discovery order
    pub fn ordered_groups(&self) -> Vec<&GroupObject> {
        let mut ordered: Vec<&GroupObject> = self.groups.iter().collect();
        ordered.sort_by_key(|g| !g.view.is_sticky);
        ordered
    }

    /// Remove a URL from this group and all descendants, dropping groups left empty
    pub fn remove_url(&mut self, url: &str) -> bool {
        let before = self.watchables.len();
        self.watchables.retain(|u| u != url);
        let mut removed = self.watchables.len() != before;

        for group in self.groups.iter_mut() {
            removed |= group.remove_url(url);
        }
        self.groups
            .retain(|g| !g.watchables.is_empty() || !g.groups.is_empty());
        removed
    }

    /// True if this group or a descendant references the URL
    pub fn contains_url(&self, url: &str) -> bool {
        self.watchables.iter().any(|u| u == url) || self.groups.iter().any(|g| g.contains_url(url))
    }

    /// Every URL in this subtree, depth first
    pub fn all_urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = self.watchables.iter().map(String::as_str).collect();
        for group in &self.groups {
            urls.extend(group.all_urls());
        }
        urls
    }

    pub fn set_sticky(&mut self, key: &str, sticky: bool) {
        for group in self.groups.iter_mut() {
            if group.key == key {
                group.view.is_sticky = sticky;
            }
            group.set_sticky(key, sticky);
        }
    }
}

/// Kind-specific fields of a watchable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WatchableKind {
    Movie,
    LiveStream,
    #[serde(rename_all = "camelCase")]
    TvShow {
        show_name: String,
        season: u32,
        episode: u32,
    },
}

impl WatchableKind {
    pub fn media_kind(&self) -> MediaKind {
        match self {
            WatchableKind::Movie => MediaKind::Movie,
            WatchableKind::LiveStream => MediaKind::LiveStream,
            WatchableKind::TvShow { .. } => MediaKind::TvShow,
        }
    }
}

/// A playable item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchableObject {
    #[serde(flatten)]
    pub view: Viewable,
    /// Identity key across the whole catalog
    pub url: String,
    /// Free-text group label from the source
    pub group: String,
    pub listed: ListState,
    /// URL has no file extension in its final segment
    pub possible_live_stream: bool,
    #[serde(flatten)]
    pub kind: WatchableKind,
}

impl WatchableObject {
    pub fn title(&self) -> &'static str {
        match self.kind.media_kind() {
            MediaKind::TvShow => "Tv Shows",
            MediaKind::LiveStream => "Live Stream",
            MediaKind::Movie => "Movie",
        }
    }

    pub fn title_icon(&self) -> &'static str {
        match self.kind.media_kind() {
            MediaKind::TvShow => "tvShow",
            MediaKind::LiveStream => "livestream",
            MediaKind::Movie => "film",
        }
    }

    pub fn is_hot(&self) -> bool {
        self.view.added_date.is_some()
    }

    /// "N days ago." relative to `now`, empty when there is no added date
    pub fn date_diff(&self, now: DateTime<Utc>) -> String {
        match self.view.added_date {
            Some(added) => format!("{} days ago.", (now - added).num_days()),
            None => String::new(),
        }
    }
}

/// Borrowed view over any tree node, for exhaustive matching at consumption sites
#[derive(Debug, Clone, Copy)]
pub enum ViewNode<'a> {
    Group(&'a GroupObject),
    Watchable(&'a WatchableObject),
}

impl<'a> ViewNode<'a> {
    pub fn viewable(&self) -> &'a Viewable {
        match *self {
            ViewNode::Group(group) => &group.view,
            ViewNode::Watchable(item) => &item.view,
        }
    }

    pub fn title(&self) -> &'static str {
        match *self {
            ViewNode::Group(_) => "Group",
            ViewNode::Watchable(item) => item.title(),
        }
    }

    pub fn title_icon(&self) -> &'a str {
        match *self {
            ViewNode::Group(group) if !group.icon.is_empty() => &group.icon,
            ViewNode::Group(_) => "folder",
            ViewNode::Watchable(item) => item.title_icon(),
        }
    }
}

/// Serializable snapshot of a group with its items resolved
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub key: String,
    pub name: String,
    pub title: &'static str,
    pub title_icon: String,
    pub is_sticky: bool,
    pub counts: GroupCounts,
    pub groups: Vec<GroupView>,
    pub items: Vec<WatchableView>,
}

/// Serializable snapshot of a watchable with presentation hints
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchableView {
    #[serde(flatten)]
    pub item: WatchableObject,
    pub title: &'static str,
    pub title_icon: &'static str,
    pub list_icon: &'static str,
    pub is_hot: bool,
    pub date_diff: String,
}

impl WatchableView {
    pub fn new(item: &WatchableObject, now: DateTime<Utc>) -> Self {
        Self {
            title: item.title(),
            title_icon: item.title_icon(),
            list_icon: item.listed.list_icon(),
            is_hot: item.is_hot(),
            date_diff: item.date_diff(now),
            item: item.clone(),
        }
    }
}

/// Top-level counts of a loaded catalog
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSummary {
    pub profile_id: u32,
    pub is_loaded: bool,
    pub group_count: usize,
    #[serde(flatten)]
    pub counts: GroupCounts,
    pub favorites: usize,
    pub watched: usize,
    pub recently_added: usize,
}
