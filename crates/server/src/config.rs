//! Server configuration and shared state

use anyhow::Result;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::ExistenceCache;
use crate::content::{ContentStore, MemoryContentStore, SqliteContentStore};
use crate::core::auth::{MemorySessionProvider, SessionProvider, SqliteSessionProvider};
use crate::core::db;
use crate::relationships::{
    EngineOptions, MemoryRelationshipStore, RelationshipStore, SqliteRelationshipStore,
    ToggleEngine,
};

/// Where relationship, session and content rows live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    /// Everything in process memory; nothing survives a restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

/// Configuration for the Affinity server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Directory holding the SQLite database
    pub data_dir: PathBuf,
    /// HTTP listen port
    pub port: u16,
    pub storage: StorageBackend,
    /// How long an existence answer is trusted
    pub cache_ttl_secs: u64,
    /// Interval of the background cache sweep
    pub cache_sweep_secs: u64,
    pub default_page_limit: u32,
    pub max_page_limit: u32,
    /// Use the store's atomic toggle instead of probe-then-insert
    pub prefer_native_toggle: bool,
    pub allow_self_like: bool,
    pub session_ttl_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: affinity_common::local_dir(),
            port: 3001,
            storage: StorageBackend::Sqlite,
            cache_ttl_secs: 300,
            cache_sweep_secs: 60,
            default_page_limit: 20,
            max_page_limit: 50,
            prefer_native_toggle: true,
            allow_self_like: true,
            session_ttl_days: 30,
        }
    }
}

const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const MAX_SESSION_TTL_DAYS: i64 = 3650;
const MAX_PAGE_LIMIT: u32 = 1000;

fn bounded<T: PartialOrd + Copy + fmt::Debug>(key: &str, value: T, lo: T, hi: T) -> T {
    if value < lo {
        warn!("{}={:?} below {:?}, clamping", key, value, lo);
        lo
    } else if value > hi {
        warn!("{}={:?} above {:?}, clamping", key, value, hi);
        hi
    } else {
        value
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                warn!("Ignoring unparsable {}={:?}", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

impl ServerConfig {
    /// Defaults overridden by `AFFINITY_*` environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            data_dir: d.data_dir,
            port: env_or("AFFINITY_PORT", d.port),
            storage: env_or("AFFINITY_STORE", d.storage),
            cache_ttl_secs: env_or("AFFINITY_CACHE_TTL_SECS", d.cache_ttl_secs),
            cache_sweep_secs: env_or("AFFINITY_CACHE_SWEEP_SECS", d.cache_sweep_secs),
            default_page_limit: env_or("AFFINITY_DEFAULT_PAGE_LIMIT", d.default_page_limit),
            max_page_limit: env_or("AFFINITY_MAX_PAGE_LIMIT", d.max_page_limit),
            prefer_native_toggle: env_or("AFFINITY_NATIVE_TOGGLE", d.prefer_native_toggle),
            allow_self_like: env_or("AFFINITY_ALLOW_SELF_LIKE", d.allow_self_like),
            session_ttl_days: env_or("AFFINITY_SESSION_TTL_DAYS", d.session_ttl_days),
        }
        .clamped()
    }

    /// Pull durations and page sizes into ranges the cache, session and
    /// paging arithmetic can handle.
    pub fn clamped(self) -> Self {
        let max_page_limit =
            bounded("AFFINITY_MAX_PAGE_LIMIT", self.max_page_limit, 1, MAX_PAGE_LIMIT);
        Self {
            cache_ttl_secs: bounded(
                "AFFINITY_CACHE_TTL_SECS",
                self.cache_ttl_secs,
                0,
                MAX_CACHE_TTL_SECS,
            ),
            cache_sweep_secs: bounded(
                "AFFINITY_CACHE_SWEEP_SECS",
                self.cache_sweep_secs,
                0,
                MAX_CACHE_TTL_SECS,
            ),
            default_page_limit: bounded(
                "AFFINITY_DEFAULT_PAGE_LIMIT",
                self.default_page_limit,
                1,
                max_page_limit,
            ),
            max_page_limit,
            session_ttl_days: bounded(
                "AFFINITY_SESSION_TTL_DAYS",
                self.session_ttl_days,
                1,
                MAX_SESSION_TTL_DAYS,
            ),
            ..self
        }
    }

    /// Create config with custom data directory
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            prefer_native_toggle: self.prefer_native_toggle,
            allow_self_like: self.allow_self_like,
            default_page_limit: self.default_page_limit,
            max_page_limit: self.max_page_limit,
        }
    }
}

/// App state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ToggleEngine>,
    pub sessions: Arc<dyn SessionProvider>,
}

impl AppState {
    pub fn new(engine: Arc<ToggleEngine>, sessions: Arc<dyn SessionProvider>) -> Self {
        Self { engine, sessions }
    }

    /// Open the configured backend and wire the engine over it.
    pub async fn open(config: ServerConfig) -> Result<Self> {
        let (store, content, sessions): (
            Arc<dyn RelationshipStore>,
            Arc<dyn ContentStore>,
            Arc<dyn SessionProvider>,
        ) = match config.storage {
            StorageBackend::Sqlite => {
                let pool = db::open_pool(&config.data_dir).await?;
                (
                    Arc::new(SqliteRelationshipStore::new(pool.clone()).await?),
                    Arc::new(SqliteContentStore::new(pool.clone()).await?),
                    Arc::new(SqliteSessionProvider::new(pool, config.session_ttl_days).await?),
                )
            }
            StorageBackend::Memory => {
                warn!("Using in-memory storage; data is lost on restart");
                (
                    Arc::new(MemoryRelationshipStore::new()),
                    Arc::new(MemoryContentStore::new()),
                    Arc::new(MemorySessionProvider::new()),
                )
            }
        };

        let cache = Arc::new(ExistenceCache::new(config.cache_ttl()));
        if config.cache_sweep_secs > 0 {
            cache.spawn_sweeper(Duration::from_secs(config.cache_sweep_secs));
        }
        info!(
            "Existence cache: ttl={}s sweep={}s",
            config.cache_ttl_secs, config.cache_sweep_secs
        );

        let engine = Arc::new(ToggleEngine::new(
            store,
            content,
            cache,
            config.engine_options(),
        ));
        Ok(Self::new(engine, sessions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::with_base_dir("/tmp/affinity");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/affinity"));
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.max_page_limit, 50);
        assert!(config.prefer_native_toggle);
        assert_eq!(config.storage, StorageBackend::Sqlite);
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("Memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert!("postgres".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let config = ServerConfig {
            cache_ttl_secs: u64::MAX,
            cache_sweep_secs: u64::MAX,
            session_ttl_days: i64::MAX,
            max_page_limit: u32::MAX,
            default_page_limit: 0,
            ..ServerConfig::with_base_dir("/tmp/affinity")
        }
        .clamped();

        assert_eq!(config.cache_ttl_secs, MAX_CACHE_TTL_SECS);
        assert_eq!(config.cache_sweep_secs, MAX_CACHE_TTL_SECS);
        assert_eq!(config.session_ttl_days, MAX_SESSION_TTL_DAYS);
        assert_eq!(config.max_page_limit, MAX_PAGE_LIMIT);
        assert_eq!(config.default_page_limit, 1);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/affinity"));

        // The arithmetic that used to overflow now stays in range.
        let _ = std::time::Instant::now() + config.cache_ttl();
        let _ = chrono::Duration::days(config.session_ttl_days);
        assert!(config.engine_options().max_page_limit.checked_add(1).is_some());

        let sane = ServerConfig::with_base_dir("/tmp/affinity").clamped();
        assert_eq!(sane.cache_ttl_secs, 300);
        assert_eq!(sane.default_page_limit, 20);
        assert_eq!(sane.session_ttl_days, 30);
    }

    #[tokio::test]
    async fn test_open_memory_backend() {
        let config = ServerConfig {
            storage: StorageBackend::Memory,
            cache_sweep_secs: 0,
            ..ServerConfig::with_base_dir("unused")
        };
        let state = AppState::open(config).await.unwrap();
        assert!(state.engine.cache().is_empty());
    }
}
