//! Shared application state handed to every handler via axum's `State`
//! extractor.

use std::sync::Arc;

use mitsume_core::cache::Cache;
use mitsume_core::executor::CachedExecutor;
use mitsume_core::notifier::NotificationRouter;
use mitsume_core::query_engine::QueryEngineClient;
use mitsume_scheduler::SchedulerConfig;
use sqlx::PgPool;
use tokio::sync::Notify;

use crate::config::Config;

pub struct AppState {
    pub pool: PgPool,
    pub executor: Arc<CachedExecutor>,
    pub router: Arc<NotificationRouter>,
    pub cache: Option<Cache>,
    pub config: Config,
    pub scheduler_config: SchedulerConfig,
    pub shutdown: Arc<Notify>,
}

impl AppState {
    pub async fn build(config: Config, pool: PgPool) -> anyhow::Result<Arc<Self>> {
        let cache = if config.cache_enabled {
            match Cache::new(&config.redis_url, config.cache_config()).await {
                Ok(c) => Some(c),
                Err(e) => {
                    tracing::warn!("cache disabled: failed to connect to redis: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let engine = QueryEngineClient::new(config.engine_dsn_template.clone());
        let executor = Arc::new(CachedExecutor::new(engine, cache.clone()));
        let router = Arc::new(NotificationRouter::new(config.smtp.clone()));

        let scheduler_config = SchedulerConfig {
            default_catalog: config.engine_default_catalog.clone(),
            default_schema: config.engine_default_schema.clone(),
        };

        Ok(Arc::new(Self {
            pool,
            executor,
            router,
            cache,
            config,
            scheduler_config,
            shutdown: Arc::new(Notify::new()),
        }))
    }
}
