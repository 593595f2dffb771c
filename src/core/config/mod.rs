//! Layered configuration: built-in defaults, then `orgserver.toml`, then
//! `ORGSERVER_*` environment variables (nested keys split on `__`,
//! e.g. `ORGSERVER_SERVER__PORT=9000`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "orgserver.toml";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub cache: CacheConfig,
    /// Replaces the built-in permission table when set.
    pub permissions_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub pool_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url: None,
            pool_size: 10,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: Option<String>,
    pub company_stats_ttl_secs: u64,
    pub employee_performance_ttl_secs: u64,
    pub dashboard_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            redis_url: None,
            company_stats_ttl_secs: 3600,
            employee_performance_ttl_secs: 1800,
            dashboard_ttl_secs: 900,
        }
    }
}

impl AppConfig {
    pub fn figment(config_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("ORGSERVER_").split("__"))
    }

    pub fn load_from(config_file: &Path) -> Result<Self, figment::Error> {
        let mut config: AppConfig = Self::figment(config_file).extract()?;
        if config.store.database_url.is_none() {
            config.store.database_url = std::env::var("DATABASE_URL").ok();
        }
        if config.cache.redis_url.is_none() {
            config.cache.redis_url = std::env::var("REDIS_URL").ok();
        }
        Ok(config)
    }

    pub fn load() -> Result<Self, figment::Error> {
        let path = std::env::var("ORGSERVER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::load_from(Path::new("/nonexistent/orgserver.toml")).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.cache.company_stats_ttl_secs, 3600);
        assert_eq!(config.cache.employee_performance_ttl_secs, 1800);
        assert_eq!(config.cache.dashboard_ttl_secs, 900);
        assert!(config.permissions_path.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 9100\n\n[cache]\ndashboard_ttl_secs = 60\n"
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.cache.dashboard_ttl_secs, 60);
        assert_eq!(config.bind_address(), "0.0.0.0:9100");
    }
}
