//! Advisory, time-boxed cache for read-only aggregates.
//!
//! Values are JSON strings. Failures never surface to callers: a broken
//! cache behaves like an empty one.

use chrono::{DateTime, Utc};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String, ttl_secs: u64);

    fn delete(&self, key: &str);
}

pub fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    let raw = cache.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Discarding undecodable cache entry {key}: {e}");
            cache.delete(key);
            None
        }
    }
}

pub fn set_json<T: Serialize>(cache: &dyn Cache, key: &str, value: &T, ttl_secs: u64) {
    match serde_json::to_string(value) {
        Ok(raw) => cache.set(key, raw, ttl_secs),
        Err(e) => warn!("Failed to encode cache entry {key}: {e}"),
    }
}

pub fn company_stats_key(company: &uuid::Uuid) -> String {
    format!("company_stats_{company}")
}

pub fn employee_performance_key(employee: &uuid::Uuid) -> String {
    format!("employee_performance_{employee}")
}

pub fn dashboard_key(dashboard_type: &str, user: &str, day: chrono::NaiveDate) -> String {
    format!("dashboard_{dashboard_type}_{user}_{day}")
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(value: String, ttl_secs: u64) -> Self {
        Self {
            value,
            expires_at: Utc::now() + chrono::Duration::seconds(ttl_secs as i64),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;
        if entry.is_expired() {
            return None;
        }
        Some(entry.value.clone())
    }

    fn set(&self, key: &str, value: String, ttl_secs: u64) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, e| !e.is_expired());
            entries.insert(key.to_string(), CacheEntry::new(value, ttl_secs));
        }
    }

    fn delete(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }
}

#[cfg(feature = "cache")]
pub struct RedisCache {
    client: redis::Client,
}

#[cfg(feature = "cache")]
impl RedisCache {
    pub fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_connection()?;
        redis::cmd("PING").query::<String>(&mut conn)?;
        Ok(Self { client })
    }
}

#[cfg(feature = "cache")]
impl Cache for RedisCache {
    fn get(&self, key: &str) -> Option<String> {
        use redis::Commands;

        let mut conn = match self.client.get_connection() {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Failed to connect to cache: {e}");
                return None;
            }
        };
        conn.get::<_, Option<String>>(key).unwrap_or_else(|e| {
            warn!("Cache read failed for {key}: {e}");
            None
        })
    }

    fn set(&self, key: &str, value: String, ttl_secs: u64) {
        use redis::Commands;

        match self.client.get_connection() {
            Ok(mut conn) => {
                if let Err(e) = conn.set_ex::<_, _, ()>(key, value, ttl_secs) {
                    warn!("Cache write failed for {key}: {e}");
                }
            }
            Err(e) => warn!("Failed to connect to cache: {e}"),
        }
    }

    fn delete(&self, key: &str) {
        use redis::Commands;

        match self.client.get_connection() {
            Ok(mut conn) => {
                if let Err(e) = conn.del::<_, ()>(key) {
                    warn!("Cache delete failed for {key}: {e}");
                }
            }
            Err(e) => warn!("Failed to connect to cache: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_cache_set_get_delete() {
        let cache = MemoryCache::new();
        cache.set("k", "v".to_string(), 60);
        assert_eq!(cache.get("k").as_deref(), Some("v"));
        cache.delete("k");
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_memory_cache_expiry() {
        let cache = MemoryCache::new();
        cache.set("k", "v".to_string(), 0);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_json_helpers() {
        let cache = MemoryCache::new();
        set_json(&cache, "stats", &json!({"total": 3}), 60);
        let value: serde_json::Value = get_json(&cache, "stats").unwrap();
        assert_eq!(value["total"], 3);

        cache.set("broken", "{not json".to_string(), 60);
        assert!(get_json::<serde_json::Value>(&cache, "broken").is_none());
        assert!(cache.get("broken").is_none());
    }

    #[test]
    fn test_dashboard_key_is_per_user_and_day() {
        let day = chrono::NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(
            dashboard_key("main", "ana@example.com", day),
            "dashboard_main_ana@example.com_2025-03-01"
        );
    }
}
