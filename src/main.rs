use std::sync::Arc;

use anyhow::Context;
use scentmatch_engine::{
    cache::{AnalyticsCache, CacheBackend, CacheSettings, MemoryCacheBackend, SystemClock},
    config::{CacheBackendKind, Config},
    db::{create_pool, create_redis_client, RedisCacheBackend},
    routes::{create_router, AppState},
    services::{
        composer::{ComposerSettings, RecommendationComposer},
        insights::InsightsService,
        providers::{HttpMlScorer, PgCatalogStore, PgHistoryStore},
    },
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let db_pool = create_pool(&config.database_url, config.dependency_timeout()).await?;
    let catalog = Arc::new(PgCatalogStore::new(db_pool.clone()));
    let history = Arc::new(PgHistoryStore::new(db_pool));
    let ml = Arc::new(HttpMlScorer::new(
        config.ml_service_url.clone(),
        config.ml_api_key.clone(),
        config.dependency_timeout(),
    )?);

    let backend: Arc<dyn CacheBackend> = match config.cache_backend {
        CacheBackendKind::Memory => Arc::new(MemoryCacheBackend::new()),
        CacheBackendKind::Redis => {
            Arc::new(RedisCacheBackend::new(create_redis_client(&config.redis_url)?))
        }
    };
    let clock = Arc::new(SystemClock);
    let cache = AnalyticsCache::new(
        backend,
        clock.clone(),
        CacheSettings {
            generation_timeout: config.generation_timeout(),
            refresh_threshold_ratio: config.refresh_threshold_ratio,
        },
    );

    let insights = InsightsService::new(history.clone(), cache.clone());
    let composer = RecommendationComposer::new(
        catalog,
        history,
        ml,
        insights.clone(),
        clock,
        ComposerSettings {
            dependency_timeout: config.dependency_timeout(),
            composition_timeout: config.composition_timeout(),
        },
    );

    let app = create_router(AppState::new(composer, insights, cache));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "ScentMatch engine listening");

    axum::serve(listener, app).await?;
    Ok(())
}
