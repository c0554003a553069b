//! Services
//!
//! Parsing and classification are pure. The catalog folds classified
//! entries into per-profile trees, and the manager ties catalogs to
//! profiles, storage and playlist downloads.

pub mod catalog;
pub mod catalog_store;
pub mod classifier;
pub mod fetch;
pub mod m3u_parser;
pub mod manager;
pub mod notify;
pub mod storage;

pub use catalog::{Catalog, CatalogList};
pub use fetch::{Fetcher, HttpFetcher};
pub use manager::IptvManager;
pub use notify::{Notifier, NotifyKind, TracingNotifier};
pub use storage::{FileStorage, MemoryStorage, RedisStorage, Storage, StorageExt};
