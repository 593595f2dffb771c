use log::{info, warn};
use std::sync::Arc;

use crate::core::cache::{Cache, MemoryCache};
use crate::core::config::{AppConfig, CacheBackend, StoreBackend};
use crate::core::store::Repository;
use crate::security::PermissionTable;

pub struct AppState {
    pub repo: Repository,
    pub cache: Arc<dyn Cache>,
    pub permissions: Arc<PermissionTable>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        repo: Repository,
        cache: Arc<dyn Cache>,
        permissions: PermissionTable,
        config: AppConfig,
    ) -> Self {
        Self {
            repo,
            cache,
            permissions: Arc::new(permissions),
            config,
        }
    }

    /// In-memory store and cache with the built-in permission table.
    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self::new(
            Repository::in_memory(),
            Arc::new(MemoryCache::new()),
            PermissionTable::builtin()?,
            AppConfig::default(),
        ))
    }

    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let permissions = match &config.permissions_path {
            Some(path) => {
                info!("Loading permission table from {}", path.display());
                PermissionTable::load(path)?
            }
            None => PermissionTable::builtin()?,
        };
        let repo = init_store(&config)?;
        let cache = init_cache(&config);
        Ok(Self::new(repo, cache, permissions, config))
    }
}

fn init_store(config: &AppConfig) -> anyhow::Result<Repository> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory record store");
            Ok(Repository::in_memory())
        }
        #[cfg(feature = "postgres")]
        StoreBackend::Postgres => {
            use crate::core::shared::utils::{create_pool, run_migrations};
            use crate::core::store::PgStore;
            use anyhow::Context;

            let url = config
                .store
                .database_url
                .as_deref()
                .context("store.backend is postgres but no database URL is configured")?;
            let pool = create_pool(url, config.store.pool_size)?;
            run_migrations(&pool).map_err(|e| anyhow::anyhow!("{e}"))?;
            info!("Using PostgreSQL record store");
            Ok(Repository::new(Arc::new(PgStore::new(pool))))
        }
        #[cfg(not(feature = "postgres"))]
        StoreBackend::Postgres => {
            anyhow::bail!("store.backend is postgres but the postgres feature is not enabled")
        }
    }
}

fn init_cache(config: &AppConfig) -> Arc<dyn Cache> {
    match config.cache.backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        #[cfg(feature = "cache")]
        CacheBackend::Redis => {
            let url = config
                .cache
                .redis_url
                .clone()
                .unwrap_or_else(|| "redis://127.0.0.1/".to_string());
            match crate::core::cache::RedisCache::connect(&url) {
                Ok(cache) => {
                    info!("Connected to Redis cache");
                    Arc::new(cache)
                }
                Err(e) => {
                    warn!("Failed to connect to Redis ({e}), falling back to in-memory cache");
                    Arc::new(MemoryCache::new())
                }
            }
        }
        #[cfg(not(feature = "cache"))]
        CacheBackend::Redis => {
            warn!("Redis cache requested but the cache feature is not enabled; using in-memory cache");
            Arc::new(MemoryCache::new())
        }
    }
}
