//! Runtime configuration read from the environment.
//!
//! A `.env` file in the working directory is loaded first when present;
//! variables already set in the process environment take precedence.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::logging::LogFormat;
use crate::security::DEFAULT_KEY_PARAM;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required variable {0} is not set")]
    Missing(&'static str),

    #[error("variable {name} has invalid value `{value}`: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Where cached quotes live.
#[derive(Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// In-process map, swept on an interval.
    Memory,
    /// A Redis server at `url`.
    Redis { url: String, pool_size: usize },
}

impl CacheBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis { .. } => "redis",
        }
    }
}

/// Where quotes are read from.
#[derive(Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// The JSON seed file at `QUOTES_PATH`.
    Memory,
    /// The `quotes` table of the PostgreSQL database at `url`.
    Postgres { url: String, pool_size: usize },
}

impl StoreBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }
}

// Backend URLs may carry credentials, so only the kind is shown.
impl fmt::Debug for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

impl fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_POOL_SIZE: u64 = 16;

#[derive(Clone)]
pub struct Config {
    pub server_address: String,
    pub api_key: String,
    pub api_key_param: String,
    pub quotes_path: PathBuf,
    pub store: StoreBackend,
    pub cache: CacheBackend,
    pub cache_ttl: Duration,
    pub cache_sweep_interval: Duration,
    pub port_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Loads `.env` (if any) and reads the process environment.
    ///
    /// # Errors
    ///
    /// See [`Config::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is the normal case outside development.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from `lookup`, which maps a variable name to
    /// its value. Unset and blank variables take their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] when `API_KEY` is unset or blank,
    /// [`ConfigError::Invalid`] when a value does not parse or a duration is zero.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = get("API_KEY").ok_or(ConfigError::Missing("API_KEY"))?;
        let cache = cache_backend(&get)?;
        let store = store_backend(&get)?;

        Ok(Self {
            server_address: get("SERVER_ADDRESS").unwrap_or_else(|| "127.0.0.1:8080".to_owned()),
            api_key,
            api_key_param: get("API_KEY_PARAM")
                .map(|p| p.trim().to_owned())
                .unwrap_or_else(|| DEFAULT_KEY_PARAM.to_owned()),
            quotes_path: get("QUOTES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/quotes.json")),
            store,
            cache,
            cache_ttl: secs("CACHE_TTL_SECS", get("CACHE_TTL_SECS"), 60)?,
            cache_sweep_interval: secs("CACHE_SWEEP_SECS", get("CACHE_SWEEP_SECS"), 30)?,
            port_timeout: millis("PORT_TIMEOUT_MS", get("PORT_TIMEOUT_MS"), 2000)?,
            read_timeout: secs("READ_TIMEOUT_SECS", get("READ_TIMEOUT_SECS"), 20)?,
            write_timeout: secs("WRITE_TIMEOUT_SECS", get("WRITE_TIMEOUT_SECS"), 20)?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_owned()),
            log_format: parsed("LOG_FORMAT", get("LOG_FORMAT"), LogFormat::default())?,
        })
    }
}

fn parsed<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

fn positive(name: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let n = parsed(name, raw.clone(), default)?;
    if n == 0 {
        return Err(ConfigError::Invalid {
            name,
            value: raw.unwrap_or_default(),
            reason: "must be greater than zero".to_owned(),
        });
    }
    Ok(n)
}

fn pool_size(name: &'static str, raw: Option<String>) -> Result<usize, ConfigError> {
    let n = positive(name, raw.clone(), DEFAULT_POOL_SIZE)?;
    usize::try_from(n).map_err(|e| ConfigError::Invalid {
        name,
        value: raw.unwrap_or_default(),
        reason: e.to_string(),
    })
}

fn cache_backend<G>(get: &G) -> Result<CacheBackend, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get("CACHE_BACKEND").map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("memory") => Ok(CacheBackend::Memory),
        Some("redis") => Ok(CacheBackend::Redis {
            url: get("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_owned()),
            pool_size: pool_size("REDIS_POOL_SIZE", get("REDIS_POOL_SIZE"))?,
        }),
        Some(other) => Err(ConfigError::Invalid {
            name: "CACHE_BACKEND",
            value: other.to_owned(),
            reason: "expected `memory` or `redis`".to_owned(),
        }),
    }
}

fn store_backend<G>(get: &G) -> Result<StoreBackend, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get("STORE_BACKEND").map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("memory") => Ok(StoreBackend::Memory),
        Some("postgres") => Ok(StoreBackend::Postgres {
            url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            pool_size: pool_size("DATABASE_POOL_SIZE", get("DATABASE_POOL_SIZE"))?,
        }),
        Some(other) => Err(ConfigError::Invalid {
            name: "STORE_BACKEND",
            value: other.to_owned(),
            reason: "expected `memory` or `postgres`".to_owned(),
        }),
    }
}

fn secs(name: &'static str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    positive(name, raw, default).map(Duration::from_secs)
}

fn millis(name: &'static str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    positive(name, raw, default).map(Duration::from_millis)
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_address", &self.server_address)
            .field("api_key", &"<redacted>")
            .field("api_key_param", &self.api_key_param)
            .field("quotes_path", &self.quotes_path)
            .field("store", &self.store)
            .field("cache", &self.cache)
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_sweep_interval", &self.cache_sweep_interval)
            .field("port_timeout", &self.port_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_key_is_set() {
        let cfg = Config::from_lookup(lookup(&[("API_KEY", "k")])).unwrap();
        assert_eq!(cfg.server_address, "127.0.0.1:8080");
        assert_eq!(cfg.api_key_param, "citaty-key");
        assert_eq!(cfg.quotes_path, PathBuf::from("data/quotes.json"));
        assert_eq!(cfg.cache_ttl, Duration::from_secs(60));
        assert_eq!(cfg.cache_sweep_interval, Duration::from_secs(30));
        assert_eq!(cfg.port_timeout, Duration::from_millis(2000));
        assert_eq!(cfg.read_timeout, Duration::from_secs(20));
        assert_eq!(cfg.write_timeout, Duration::from_secs(20));
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.store, StoreBackend::Memory);
        assert_eq!(cfg.cache, CacheBackend::Memory);
    }

    #[test]
    fn api_key_is_required() {
        assert_eq!(
            Config::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::Missing("API_KEY")
        );
        assert_eq!(
            Config::from_lookup(lookup(&[("API_KEY", "  ")])).unwrap_err(),
            ConfigError::Missing("API_KEY")
        );
    }

    #[test]
    fn overrides_are_read() {
        let cfg = Config::from_lookup(lookup(&[
            ("API_KEY", "k"),
            ("SERVER_ADDRESS", "0.0.0.0:9000"),
            ("API_KEY_PARAM", "key"),
            ("CACHE_TTL_SECS", "5"),
            ("PORT_TIMEOUT_MS", "150"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();
        assert_eq!(cfg.server_address, "0.0.0.0:9000");
        assert_eq!(cfg.api_key_param, "key");
        assert_eq!(cfg.cache_ttl, Duration::from_secs(5));
        assert_eq!(cfg.port_timeout, Duration::from_millis(150));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn malformed_numbers_are_invalid() {
        let err = Config::from_lookup(lookup(&[("API_KEY", "k"), ("CACHE_TTL_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "CACHE_TTL_SECS", .. }));
    }

    #[test]
    fn zero_durations_are_invalid() {
        let err = Config::from_lookup(lookup(&[("API_KEY", "k"), ("PORT_TIMEOUT_MS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT_TIMEOUT_MS", .. }));
    }

    #[test]
    fn zero_duration_error_shows_the_raw_value() {
        let err = Config::from_lookup(lookup(&[("API_KEY", "k"), ("CACHE_TTL_SECS", " 00 ")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "CACHE_TTL_SECS",
                value: " 00 ".to_owned(),
                reason: "must be greater than zero".to_owned(),
            }
        );
        assert!(err.to_string().contains("` 00 `"));
    }

    #[test]
    fn redis_cache_is_selectable() {
        let cfg = Config::from_lookup(lookup(&[("API_KEY", "k"), ("CACHE_BACKEND", "Redis")]))
            .unwrap();
        assert_eq!(
            cfg.cache,
            CacheBackend::Redis {
                url: "redis://127.0.0.1:6379".to_owned(),
                pool_size: 16,
            }
        );

        let cfg = Config::from_lookup(lookup(&[
            ("API_KEY", "k"),
            ("CACHE_BACKEND", "redis"),
            ("REDIS_URL", "redis://cache:6380/1"),
            ("REDIS_POOL_SIZE", "4"),
        ]))
        .unwrap();
        assert_eq!(
            cfg.cache,
            CacheBackend::Redis {
                url: "redis://cache:6380/1".to_owned(),
                pool_size: 4,
            }
        );
    }

    #[test]
    fn postgres_store_needs_a_url() {
        assert_eq!(
            Config::from_lookup(lookup(&[("API_KEY", "k"), ("STORE_BACKEND", "postgres")]))
                .unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );

        let cfg = Config::from_lookup(lookup(&[
            ("API_KEY", "k"),
            ("STORE_BACKEND", "postgres"),
            ("DATABASE_URL", "postgres://citaty:pw@db/citaty"),
        ]))
        .unwrap();
        assert_eq!(
            cfg.store,
            StoreBackend::Postgres {
                url: "postgres://citaty:pw@db/citaty".to_owned(),
                pool_size: 16,
            }
        );
    }

    #[test]
    fn unknown_backends_are_invalid() {
        let err = Config::from_lookup(lookup(&[("API_KEY", "k"), ("CACHE_BACKEND", "memcached")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "CACHE_BACKEND", .. }));
        let err = Config::from_lookup(lookup(&[("API_KEY", "k"), ("STORE_BACKEND", "sqlite")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "STORE_BACKEND", .. }));
    }

    #[test]
    fn unknown_log_format_is_invalid() {
        let err =
            Config::from_lookup(lookup(&[("API_KEY", "k"), ("LOG_FORMAT", "xml")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "LOG_FORMAT", .. }));
    }

    #[test]
    fn debug_redacts_the_key() {
        let cfg = Config::from_lookup(lookup(&[
            ("API_KEY", "hunter2"),
            ("STORE_BACKEND", "postgres"),
            ("DATABASE_URL", "postgres://citaty:swordfish@db/citaty"),
        ]))
        .unwrap();
        let shown = format!("{cfg:?}");
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("swordfish"));
        assert!(shown.contains("<redacted>"));
        assert!(shown.contains("store: postgres"));
    }
}
