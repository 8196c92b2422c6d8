//! Application configuration loaded from environment variables.

use std::str::FromStr;

use chrono::Duration;
use domain::TokenPolicy;

const DEFAULT_PORT: u16 = 8000;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `0.0.0.0`)
/// - `PORT`: listen port (default `8000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset selects the in-memory store
/// - `STAGING_DIR`: the only directory uploads are taken from (default `./public/temp`)
/// - `ASSET_DIR`: where uploaded assets are copied (default `./public/assets`)
/// - `ASSET_BASE_URL`: public prefix of asset URLs (default `http://localhost:8000/assets`)
/// - `ACCESS_TOKEN_TTL_MINUTES` (default `60`) and `REFRESH_TOKEN_TTL_DAYS` (default `10`)
/// - `CORS_ORIGIN`: allowed origin, `*` for any (default `*`)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub staging_dir: String,
    pub asset_dir: String,
    pub asset_base_url: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse(var("PORT")).unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: var("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            staging_dir: var("STAGING_DIR").unwrap_or(defaults.staging_dir),
            asset_dir: var("ASSET_DIR").unwrap_or(defaults.asset_dir),
            asset_base_url: var("ASSET_BASE_URL").unwrap_or(defaults.asset_base_url),
            access_token_ttl_minutes: parse(var("ACCESS_TOKEN_TTL_MINUTES"))
                .filter(|m: &i64| *m > 0)
                .unwrap_or(defaults.access_token_ttl_minutes),
            refresh_token_ttl_days: parse(var("REFRESH_TOKEN_TTL_DAYS"))
                .filter(|d: &i64| *d > 0)
                .unwrap_or(defaults.refresh_token_ttl_days),
            cors_origin: var("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn token_policy(&self) -> TokenPolicy {
        TokenPolicy {
            access_ttl: Duration::minutes(self.access_token_ttl_minutes),
            refresh_ttl: Duration::days(self.refresh_token_ttl_days),
        }
    }
}

fn parse<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            database_url: None,
            staging_dir: "./public/temp".to_string(),
            asset_dir: "./public/assets".to_string(),
            asset_base_url: format!("http://localhost:{DEFAULT_PORT}/assets"),
            access_token_ttl_minutes: 60,
            refresh_token_ttl_days: 10,
            cors_origin: "*".to_string(),
        }
    }
}
