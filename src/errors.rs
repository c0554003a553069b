//! Error types for the catalog core
//!
//! Parsing, fetching and storage each have their own enum so callers can
//! match on the failure they care about; `CatalogError` wraps all of them for
//! the manager and the HTTP layer.

use thiserror::Error;

/// Errors raised while reading M3U text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Missing or wrong `#EXTM3U` header. Fatal for the parse call.
    #[error("Invalid playlist format (missing #EXTM3U header)")]
    InvalidFormat,

    /// One metadata line could not be tokenized. Recovered by skipping the pair.
    #[error("Malformed line: {reason}: {line}")]
    MalformedLine { line: String, reason: String },
}

/// Errors raised while downloading playlist content
#[derive(Error, Debug)]
pub enum FetchError {
    /// Network/connection error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx HTTP status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Body larger than the configured cap
    #[error("Playlist too large: {size_mb:.1}MB (limit {limit_mb}MB)")]
    TooLarge { size_mb: f64, limit_mb: usize },

    /// Body is not UTF-8 text or does not start with `#EXTM3U`
    #[error("Unexpected content: {0}")]
    ContentType(String),
}

/// Errors raised by a storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Top-level error type for catalog operations
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("Profile with this URL already exists: {url}")]
    DuplicateProfile { url: String },

    #[error("Profile not found: {id}")]
    ProfileNotFound { id: u32 },

    #[error("Item not found: {url}")]
    ItemNotFound { url: String },

    #[error("Catalog load already in progress for profile {id}")]
    LoadInProgress { id: u32 },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },
}

pub type CatalogResult<T> = Result<T, CatalogError>;
