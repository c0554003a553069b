use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iptv_catalog::config::{Config, StorageBackend};
use iptv_catalog::routes;
use iptv_catalog::services::{
    FileStorage, HttpFetcher, IptvManager, MemoryStorage, RedisStorage, Storage, TracingNotifier,
};
use iptv_catalog::AppState;

async fn open_storage(config: &Config) -> anyhow::Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.storage_backend {
        StorageBackend::File => {
            let storage = FileStorage::new(&config.storage_dir).await?;
            tracing::info!("File storage initialized: {}", config.storage_dir);
            Arc::new(storage)
        }
        StorageBackend::Redis => {
            let storage = RedisStorage::new(&config.redis_url, &config.storage_namespace).await?;
            if !storage.ping().await? {
                anyhow::bail!("Redis did not answer PING at {}", config.redis_url);
            }
            tracing::info!("Redis connected: {}", config.redis_url);
            Arc::new(storage)
        }
        StorageBackend::Memory => {
            tracing::warn!("Memory storage selected, nothing will be persisted");
            Arc::new(MemoryStorage::new())
        }
    };
    Ok(storage)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iptv_catalog=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();
    let port = config.port;

    tracing::info!("Starting IPTV Catalog v{}", env!("CARGO_PKG_VERSION"));

    let storage = open_storage(&config).await?;

    let fetcher = HttpFetcher::new(
        &config.user_agent,
        config.fetch_timeout_ms,
        config.max_retries,
        config.max_m3u_size_mb,
    )?;

    let manager = IptvManager::open(storage, Arc::new(fetcher), config.lately_added_days).await;

    // Build application state
    let state = Arc::new(AppState {
        config,
        manager,
        start_time: Instant::now(),
    });

    // Reopen the last used profile in the background
    let last_profile = if state.config.load_last_profile {
        state.manager.last_loaded_profile().await
    } else {
        None
    };
    if let Some(profile) = last_profile {
        let state_clone = state.clone();
        tokio::spawn(async move {
            tracing::info!(profile_id = profile.id, "Loading last used profile");
            if let Err(e) = state_clone
                .manager
                .load_catalog(profile.id, false, &TracingNotifier)
                .await
            {
                tracing::error!(profile_id = profile.id, "Startup load failed: {}", e);
            }
        });
    }

    let app = routes::router(state.clone());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.manager.shutdown().await;
    Ok(())
}
