//! Main entry point for the portal backend.
//!
//! This file initializes the Axum web server, sets up the database and cache
//! connections, builds the scheduler pool, and registers all API routes and
//! middleware. It orchestrates the application's startup and defines its
//! overall structure.

mod api;
mod auth;
mod cache;
mod config;
mod database;
mod errors;
mod middleware;
mod services;
mod state;
mod utils;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::auth::service::AuthService;
use crate::cache::{Cache, MemoryCache, RedisCache};
use crate::config::Config;
use crate::database::Db;
use crate::services::notify::NotifyQueue;
use crate::services::scheduler_pool::SchedulerPool;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config_path =
        std::env::var("PORTAL_CONFIG").unwrap_or_else(|_| "portal.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path)?
    } else {
        tracing::warn!("config file {config_path} not found, using defaults");
        Config::default()
    };

    let db = Db::connect(&config.database.url)
        .await
        .map_err(|e| anyhow::anyhow!("database init: {e}"))?;

    let cache: Arc<dyn Cache> = match &config.cache.redis_url {
        Some(url) => {
            let redis = RedisCache::connect(url)
                .await
                .map_err(|e| anyhow::anyhow!("redis init: {e}"))?;
            Arc::new(redis)
        }
        None => {
            tracing::warn!("no redis configured, running on the in-memory cache");
            Arc::new(MemoryCache::new())
        }
    };

    let auth = AuthService::new(
        &config.auth.token_secret,
        config.auth.token_ttl_hours,
        cache.clone(),
    );

    let schedulers = Arc::new(SchedulerPool::with_rpc_clients(
        cache.clone(),
        config.scheduler.default_area.clone(),
    ));

    let notify = if config.notify.enabled {
        let (queue, _worker) = NotifyQueue::spawn(config.notify.callback_secret.clone());
        Some(queue)
    } else {
        None
    };

    let listen = config.server.listen.clone();
    let state = Arc::new(AppState {
        db,
        cache,
        schedulers,
        auth,
        notify,
    });

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!("listening on {listen}");
    axum::serve(listener, app).await?;

    Ok(())
}
