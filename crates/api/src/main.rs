use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use warden_api::app::{build_app, SharedStore};
use warden_api::config::AppConfig;
use warden_infra::cache::{InMemoryRevocationCache, RevocationCache};
use warden_infra::store::{InMemoryStore, PostgresStore};
use warden_infra::PurgeRunner;

const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_observability::init();

    let config = AppConfig::from_env();
    config
        .policy
        .validate()
        .context("route policy failed validation")?;

    let store: SharedStore = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(8)
                .connect(&url)
                .await
                .context("failed to connect to postgres")?;
            let store = PostgresStore::new(pool);
            store
                .ensure_schema()
                .await
                .context("failed to ensure schema")?;
            Arc::new(store)
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; using in-memory store (dev only)");
            Arc::new(InMemoryStore::new())
        }
    };

    let cache: Option<Arc<dyn RevocationCache>> = build_cache()?;

    tokio::spawn(PurgeRunner::new(store.clone(), PURGE_INTERVAL).run());

    let bind_addr = config.bind_addr.clone();
    let app = build_app(config, store, cache);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(feature = "redis")]
fn build_cache() -> anyhow::Result<Option<Arc<dyn RevocationCache>>> {
    match std::env::var("REDIS_URL") {
        Ok(url) => {
            let cache = warden_infra::cache::RedisRevocationCache::new(&url, "warden")
                .context("failed to open redis client")?;
            Ok(Some(Arc::new(cache)))
        }
        Err(_) => {
            tracing::warn!("REDIS_URL not set; using in-memory revocation cache");
            Ok(Some(Arc::new(InMemoryRevocationCache::new())))
        }
    }
}

#[cfg(not(feature = "redis"))]
fn build_cache() -> anyhow::Result<Option<Arc<dyn RevocationCache>>> {
    Ok(Some(Arc::new(InMemoryRevocationCache::new())))
}
