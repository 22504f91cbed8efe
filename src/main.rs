//! citaty service entry point.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use citaty::app::{App, BootError};
use citaty::cache::{Cache, MemoryCache};
use citaty::config::{CacheBackend, Config, StoreBackend};
use citaty::database::{MemoryStore, QuoteStore};
use citaty::logging;
use citaty::quotes::QuoteService;
use citaty::security::AccessValidator;
use citaty::server::Server;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The subscriber may not be installed yet, so report on stderr.
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), BootError> {
    let config = Config::from_env()?;
    logging::init(&config.log_level, config.log_format);
    debug!(?config, "configuration loaded");

    let store = open_store(&config).await?;
    let cache = open_cache(&config).await?;
    info!(store = store.name(), cache = cache.name(), "backends ready");

    let service = QuoteService::new(store, cache)
        .with_cache_ttl(config.cache_ttl)
        .with_port_timeout(config.port_timeout);
    let app = Arc::new(App::new(
        service,
        AccessValidator::new(&config.api_key),
        &config.api_key_param,
    ));

    let server = Server::bind(&config.server_address)
        .await?
        .read_timeout(config.read_timeout)
        .write_timeout(config.write_timeout);

    server
        .run_until_shutdown(
            move |req| {
                let app = Arc::clone(&app);
                async move { app.handle(req).await }
            },
            shutdown_signal(),
        )
        .await?;

    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<dyn QuoteStore>, BootError> {
    match &config.store {
        StoreBackend::Memory => Ok(Arc::new(
            MemoryStore::from_json_file(&config.quotes_path).await?,
        )),
        #[cfg(feature = "postgres")]
        StoreBackend::Postgres { url, pool_size } => {
            let store = citaty::database::PostgresStore::connect(url, *pool_size)?;
            store.verify().await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StoreBackend::Postgres { .. } => Err(BootError::BackendDisabled {
            kind: "postgres",
            feature: "postgres",
        }),
    }
}

async fn open_cache(config: &Config) -> Result<Arc<dyn Cache>, BootError> {
    match &config.cache {
        CacheBackend::Memory => {
            let cache = Arc::new(MemoryCache::new());
            spawn_sweeper(Arc::clone(&cache), config.cache_sweep_interval);
            Ok(cache)
        }
        #[cfg(feature = "redis")]
        CacheBackend::Redis { url, pool_size } => {
            let cache = citaty::cache::RedisCache::connect(url, *pool_size, config.port_timeout)?;
            cache.verify().await?;
            Ok(Arc::new(cache))
        }
        #[cfg(not(feature = "redis"))]
        CacheBackend::Redis { .. } => Err(BootError::BackendDisabled {
            kind: "redis",
            feature: "redis",
        }),
    }
}

/// Periodically drops expired cache entries.
fn spawn_sweeper(cache: Arc<MemoryCache>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            cache.purge_expired();
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C, shutting down");
        return;
    }
    info!("Ctrl-C received");
}
