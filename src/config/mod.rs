//! Configuration module for the fleet backend.
//!
//! All configuration is loaded from environment variables (optionally seeded from a
//! `.env` file) with sensible defaults. Invalid values are startup errors.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Upper bound for `CARS_SNAPSHOT_TTL_SECS` (30 days).
pub const MAX_SNAPSHOT_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Default sync cadence: daily at midnight (seconds field included).
pub const DEFAULT_SYNC_SCHEDULE: &str = "0 0 0 * * *";

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Connection settings for the upstream fleet API.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL, always ending in `/` so relative paths join under it
    pub base_url: reqwest::Url,
    /// Basic-auth user for the token endpoint
    pub api_user: Option<String>,
    /// Basic-auth key for the token endpoint
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

/// Vehicle cache settings. `None` in [`Config::cache`] means passthrough mode.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// `redis://`, `rediss://` or `memory://`
    pub connection_string: String,
}

/// Sync job settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Cron expression, seconds field optional
    pub schedule: String,
    /// Run one cycle immediately after startup
    pub run_on_startup: bool,
    /// Expiry of the `cars:snapshot` key
    pub snapshot_ttl: Duration,
}

/// Bearer token validation settings for incoming requests.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub signing_key: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Path to the SQLite employee database
    pub db_path: PathBuf,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    pub upstream: UpstreamConfig,
    pub cache: Option<CacheConfig>,
    pub sync: SyncConfig,
    /// Request authentication; disabled when `None`
    pub jwt: Option<JwtConfig>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let bind_addr = env::var("FLEET_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8085".to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "FLEET_BIND_ADDR",
                reason: e.to_string(),
            })?;

        let db_path = env::var("FLEET_DB_PATH")
            .unwrap_or_else(|_| "./data/employees.sqlite".to_string())
            .into();

        let log_level = env::var("FLEET_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("FLEET_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("text") | Err(_) => LogFormat::Text,
            Ok(other) => {
                return Err(ConfigError::Invalid {
                    name: "FLEET_LOG_FORMAT",
                    reason: format!("expected 'text' or 'json', got '{}'", other),
                })
            }
        };

        let base_url = env::var("CARS_API_BASE_URL")
            .map_err(|_| ConfigError::Missing("CARS_API_BASE_URL"))?;

        let upstream = UpstreamConfig {
            base_url: parse_base_url(&base_url)?,
            api_user: non_blank("CARS_API_USER"),
            api_key: non_blank("CARS_API_KEY"),
            timeout: Duration::from_secs(parse_u64("CARS_API_TIMEOUT_SECS", 30)?),
        };

        let cache = if parse_bool("USE_REDIS_CACHE", false)? {
            let connection_string = non_blank("REDIS_CONNECTION_STRING")
                .ok_or(ConfigError::Missing("REDIS_CONNECTION_STRING"))?;
            Some(CacheConfig { connection_string })
        } else {
            None
        };

        let sync = SyncConfig {
            schedule: env::var("CARS_SYNC_SCHEDULE")
                .unwrap_or_else(|_| DEFAULT_SYNC_SCHEDULE.to_string()),
            run_on_startup: parse_bool("CARS_SYNC_ON_STARTUP", false)?,
            snapshot_ttl: Duration::from_secs(parse_snapshot_ttl()?),
        };

        let jwt = match non_blank("JWT_SIGNING_KEY") {
            Some(signing_key) => Some(JwtConfig {
                issuer: non_blank("JWT_ISSUER").ok_or(ConfigError::Missing("JWT_ISSUER"))?,
                audience: non_blank("JWT_AUDIENCE").ok_or(ConfigError::Missing("JWT_AUDIENCE"))?,
                signing_key,
            }),
            None => None,
        };

        Ok(Self {
            bind_addr,
            db_path,
            log_level,
            log_format,
            upstream,
            cache,
            sync,
            jwt,
        })
    }
}

/// Parse the upstream base URL, forcing a trailing slash so `join("auth/token")`
/// keeps any path prefix.
pub fn parse_base_url(raw: &str) -> Result<reqwest::Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };

    reqwest::Url::parse(&normalized).map_err(|e| ConfigError::Invalid {
        name: "CARS_API_BASE_URL",
        reason: e.to_string(),
    })
}

fn non_blank(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            other => Err(ConfigError::Invalid {
                name,
                reason: format!("expected a boolean, got '{}'", other),
            }),
        },
        Err(_) => Ok(default),
    }
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(v) => v.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_snapshot_ttl() -> Result<u64, ConfigError> {
    let secs = parse_u64("CARS_SNAPSHOT_TTL_SECS", 3600)?;
    if secs == 0 || secs > MAX_SNAPSHOT_TTL_SECS {
        return Err(ConfigError::Invalid {
            name: "CARS_SNAPSHOT_TTL_SECS",
            reason: format!("expected 1..={} seconds, got {}", MAX_SNAPSHOT_TTL_SECS, secs),
        });
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: &[&str] = &[
        "FLEET_BIND_ADDR",
        "FLEET_DB_PATH",
        "FLEET_LOG_LEVEL",
        "FLEET_LOG_FORMAT",
        "CARS_API_BASE_URL",
        "CARS_API_USER",
        "CARS_API_KEY",
        "CARS_API_TIMEOUT_SECS",
        "USE_REDIS_CACHE",
        "REDIS_CONNECTION_STRING",
        "CARS_SYNC_SCHEDULE",
        "CARS_SYNC_ON_STARTUP",
        "CARS_SNAPSHOT_TTL_SECS",
        "JWT_ISSUER",
        "JWT_AUDIENCE",
        "JWT_SIGNING_KEY",
    ];

    // Env vars are process-global; everything that touches them lives in one test.
    #[test]
    fn test_config_from_env() {
        for var in VARS {
            env::remove_var(var);
        }

        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("CARS_API_BASE_URL"))
        ));

        env::set_var("CARS_API_BASE_URL", "http://fleet.local/v1");
        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8085");
        assert_eq!(config.db_path, PathBuf::from("./data/employees.sqlite"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.upstream.base_url.as_str(), "http://fleet.local/v1/");
        assert!(config.upstream.api_user.is_none());
        assert_eq!(config.upstream.timeout, Duration::from_secs(30));
        assert!(config.cache.is_none());
        assert_eq!(config.sync.schedule, DEFAULT_SYNC_SCHEDULE);
        assert_eq!(config.sync.snapshot_ttl, Duration::from_secs(3600));
        assert!(config.jwt.is_none());

        env::set_var("USE_REDIS_CACHE", "true");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("REDIS_CONNECTION_STRING"))
        ));

        env::set_var("REDIS_CONNECTION_STRING", "memory://");
        env::set_var("CARS_API_USER", "  ");
        env::set_var("CARS_API_KEY", "secret");
        env::set_var("JWT_SIGNING_KEY", "signing");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("JWT_ISSUER"))
        ));
        env::set_var("JWT_ISSUER", "fleet-issuer");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("JWT_AUDIENCE"))
        ));
        env::set_var("JWT_AUDIENCE", "fleet-api");
        let config = Config::from_env().unwrap();
        assert_eq!(config.cache.unwrap().connection_string, "memory://");
        assert!(config.upstream.api_user.is_none());
        assert_eq!(config.upstream.api_key.as_deref(), Some("secret"));
        assert_eq!(config.jwt.unwrap().signing_key, "signing");

        for ttl in ["soon", "0", "2592001", "18446744073709551615"] {
            env::set_var("CARS_SNAPSHOT_TTL_SECS", ttl);
            assert!(matches!(
                Config::from_env(),
                Err(ConfigError::Invalid { name: "CARS_SNAPSHOT_TTL_SECS", .. })
            ));
        }
        env::set_var("CARS_SNAPSHOT_TTL_SECS", "2592000");
        assert_eq!(
            Config::from_env().unwrap().sync.snapshot_ttl,
            Duration::from_secs(MAX_SNAPSHOT_TTL_SECS)
        );

        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_parse_base_url_keeps_prefix() {
        let url = parse_base_url("https://fleet.example.com/gateway").unwrap();
        assert_eq!(
            url.join("auth/token").unwrap().as_str(),
            "https://fleet.example.com/gateway/auth/token"
        );
    }
}
