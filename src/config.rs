//! Configuration Module
//!
//! Handles loading server and repository configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Fixed namespaced slot the repository cache is persisted under.
pub const PERSISTED_CACHE_KEY: &str = "growthbook:cache:features";

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// JSON file holding the canonical definition set for every client key
    pub definitions_path: PathBuf,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `DEFINITIONS_PATH` - Definition catalog file (default: definitions.json)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            definitions_path: env::var("DEFINITIONS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.definitions_path),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            definitions_path: PathBuf::from("definitions.json"),
        }
    }
}

/// SDK-side repository cache configuration.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// How long a fetched payload stays fresh
    pub ttl: Duration,
    /// Per-request timeout for feature fetches
    pub fetch_timeout: Duration,
    /// Directory for durable cache storage, None keeps the cache in memory only
    pub cache_dir: Option<PathBuf>,
    /// Slot name the cache map is persisted under
    pub storage_key: String,
}

impl RepositoryConfig {
    /// Creates a new RepositoryConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL` - Freshness window in seconds (default: 60)
    /// - `FETCH_TIMEOUT` - Fetch timeout in seconds (default: 10)
    /// - `CACHE_DIR` - Durable storage directory (default: unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ttl: Duration::from_secs(env_or("CACHE_TTL", defaults.ttl.as_secs())),
            fetch_timeout: Duration::from_secs(env_or(
                "FETCH_TIMEOUT",
                defaults.fetch_timeout.as_secs(),
            )),
            cache_dir: env::var("CACHE_DIR").ok().map(PathBuf::from),
            storage_key: defaults.storage_key,
        }
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(10),
            cache_dir: None,
            storage_key: PERSISTED_CACHE_KEY.to_string(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
