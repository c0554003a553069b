//! Data model
//!
//! - Playlist entries as parsed and classified
//! - Catalog tree nodes and their serialized views
//! - Profiles and manager settings

pub mod catalog;
pub mod playlist;
pub mod profile;

// Re-export commonly used items
pub use catalog::{
    CatalogSummary, GroupCounts, GroupObject, GroupView, ListState, ViewNode, Viewable,
    WatchableKind, WatchableObject, WatchableView,
};
pub use playlist::{ClassifiedEntry, MediaKind, ParseReport, ParsedEntry, TvShowInfo};
pub use profile::{ManagerSettings, NewProfile, Profile, ProfileUpdate};
