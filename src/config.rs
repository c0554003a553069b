use std::env;

/// Where catalog state is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    File,
    Redis,
    Memory,
}

impl StorageBackend {
    fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "redis" => StorageBackend::Redis,
            "memory" => StorageBackend::Memory,
            _ => StorageBackend::File,
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,

    // Storage
    pub storage_backend: StorageBackend,
    pub storage_dir: String,
    pub redis_url: String,
    pub storage_namespace: String,

    // Fetching
    pub fetch_timeout_ms: u64,
    pub max_retries: u32,
    pub max_m3u_size_mb: usize,
    pub user_agent: String,

    // Catalog
    pub load_last_profile: bool,
    pub lately_added_days: i64,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            // Server
            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .unwrap_or(3001),

            // Storage
            storage_backend: StorageBackend::from_name(
                &env::var("STORAGE_BACKEND").unwrap_or_else(|_| "file".to_string()),
            ),
            storage_dir: env::var("STORAGE_DIR").unwrap_or_else(|_| ".iptv-data".to_string()),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            storage_namespace: env::var("STORAGE_NAMESPACE").unwrap_or_else(|_| "iptv".to_string()),

            // Fetching
            fetch_timeout_ms: env::var("FETCH_TIMEOUT_MS")
                .unwrap_or_else(|_| "300000".to_string())
                .parse()
                .unwrap_or(300_000), // 5 minutes

            max_retries: env::var("MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),

            max_m3u_size_mb: env::var("MAX_M3U_SIZE_MB")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .unwrap_or(500),

            // VLC user agent, some IPTV servers block anything else
            user_agent: env::var("USER_AGENT")
                .unwrap_or_else(|_| "VLC/3.0.20 LibVLC/3.0.20".to_string()),

            // Catalog
            load_last_profile: env::var("LOAD_LAST_PROFILE")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(true),

            lately_added_days: env::var("LATELY_ADDED_DAYS")
                .unwrap_or_else(|_| "14".to_string())
                .parse()
                .unwrap_or(14),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
