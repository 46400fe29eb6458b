//! Server configuration from environment variables
//!
//! `.env` is loaded first when present. Every variable has a development
//! default except `JWT_SECRET` in production and `DATABASE_URL` with the
//! Postgres backend.
//!
//! # Environment Variables
//!
//! - `API_HOST`, `API_PORT`: bind address (default `0.0.0.0:8080`)
//! - `API_PRODUCTION`: enables HSTS and `Secure` cookies, requires `JWT_SECRET`
//! - `CORS_ORIGINS`: comma separated origins, `*` for any (default `*`)
//! - `STORAGE_BACKEND`: `memory` (default) or `postgres`
//! - `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`
//! - `JWT_SECRET`: at least 32 characters
//! - `STRIPE_SECRET_KEY`: unset means payments run against a mock gateway
//! - `LOW_STOCK_THRESHOLD`: stock level that triggers admin alerts (default 10)
//! - `ADMIN_EMAIL`, `ADMIN_PASSWORD`: admin account created at startup
//! - `NOTIFICATION_DISPATCH`: `inline` (default) or `off`
//! - `AUTH_RATE_LIMIT_PER_MINUTE`: login/register attempts per client (default 20)
//! - `REDIS_URL`: share rate limit buckets between instances
//! - `TRUST_PROXY_HEADERS`: key rate limits by `X-Forwarded-For` (default false)
//!
//! Notification channel and dispatcher variables are read by
//! [`ChannelsConfig`] and [`DispatcherConfig`].
//!
//! # Example
//!
//! ```no_run
//! use medemede_api::config::Config;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Server will listen on {}", config.bind_address());
//! # Ok(())
//! # }
//! ```

use anyhow::{bail, Context};
use medemede_worker::config::ChannelsConfig;
use medemede_worker::dispatcher::DispatcherConfig;
use std::env;
use std::str::FromStr;

/// Signing secret used when `JWT_SECRET` is unset outside production
pub const DEV_JWT_SECRET: &str = "medemede-development-secret-do-not-deploy";

pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,

    pub storage: StorageConfig,

    pub jwt: JwtConfig,

    pub shop: ShopConfig,

    pub notifications: NotificationConfig,

    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,

    pub port: u16,

    pub production: bool,

    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            other => bail!("Unknown STORAGE_BACKEND '{}', expected memory or postgres", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Required for the Postgres backend
    pub database_url: Option<String>,

    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HS256 signing key. Generate with `openssl rand -hex 32`.
    pub secret: String,
}

/// Admin account ensured at startup
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,

    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ShopConfig {
    pub low_stock_threshold: i32,

    pub stripe_secret_key: Option<String>,

    pub admin: Option<AdminBootstrap>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Run the notification dispatcher inside the API process
    Inline,

    /// Leave the outbox to a standalone `medemede-worker`
    Off,
}

impl FromStr for DispatchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(DispatchMode::Inline),
            "off" => Ok(DispatchMode::Off),
            other => bail!("Unknown NOTIFICATION_DISPATCH '{}', expected inline or off", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub dispatch: DispatchMode,

    pub dispatcher: DispatcherConfig,

    pub channels: ChannelsConfig,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Attempts per minute per client on the auth endpoints
    pub auth_per_minute: u32,

    pub redis_url: Option<String>,

    /// Key clients by `X-Forwarded-For`; only safe behind a proxy that sets it
    pub trust_proxy_headers: bool,
}

impl Default for Config {
    /// Local development: memory store, development secret, no providers
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                production: false,
                cors_origins: vec!["*".to_string()],
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                database_url: None,
                max_connections: 10,
            },
            jwt: JwtConfig {
                secret: DEV_JWT_SECRET.to_string(),
            },
            shop: ShopConfig {
                low_stock_threshold: 10,
                stripe_secret_key: None,
                admin: None,
            },
            notifications: NotificationConfig {
                dispatch: DispatchMode::Inline,
                dispatcher: DispatcherConfig::default(),
                channels: ChannelsConfig::default(),
            },
            rate_limit: RateLimitConfig {
                auth_per_minute: 20,
                redis_url: None,
                trust_proxy_headers: false,
            },
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: Into<anyhow::Error>,
{
    match non_empty(name) {
        Some(v) => {
            let parsed: anyhow::Result<T> = v.parse().map_err(Into::into);
            parsed.with_context(|| format!("Invalid {}", name))
        }
        None => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// - a variable has an unparseable value
    /// - `JWT_SECRET` is shorter than 32 characters, or missing in production
    /// - the Postgres backend is selected without `DATABASE_URL`
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Config::default();

        let production = parse_or("API_PRODUCTION", false)?;

        let jwt_secret = match non_empty("JWT_SECRET") {
            Some(secret) => secret,
            None if production => bail!("JWT_SECRET environment variable is required in production"),
            None => {
                tracing::warn!("JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            bail!("JWT_SECRET must be at least {} characters long", MIN_JWT_SECRET_LEN);
        }

        let backend = parse_or("STORAGE_BACKEND", defaults.storage.backend)?;
        let database_url = non_empty("DATABASE_URL");
        if backend == StorageBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL environment variable is required for the postgres backend");
        }

        let cors_origins = non_empty("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.api.cors_origins);

        let admin = match (non_empty("ADMIN_EMAIL"), non_empty("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap { email, password }),
            (Some(_), None) | (None, Some(_)) => {
                bail!("ADMIN_EMAIL and ADMIN_PASSWORD must be set together")
            }
            (None, None) => None,
        };

        Ok(Self {
            api: ApiConfig {
                host: non_empty("API_HOST").unwrap_or(defaults.api.host),
                port: parse_or("API_PORT", defaults.api.port)?,
                production,
                cors_origins,
            },
            storage: StorageConfig {
                backend,
                database_url,
                max_connections: parse_or("DATABASE_MAX_CONNECTIONS", defaults.storage.max_connections)?,
            },
            jwt: JwtConfig { secret: jwt_secret },
            shop: ShopConfig {
                low_stock_threshold: parse_or("LOW_STOCK_THRESHOLD", defaults.shop.low_stock_threshold)?,
                stripe_secret_key: non_empty("STRIPE_SECRET_KEY"),
                admin,
            },
            notifications: NotificationConfig {
                dispatch: parse_or("NOTIFICATION_DISPATCH", defaults.notifications.dispatch)?,
                dispatcher: DispatcherConfig::from_env()?,
                channels: ChannelsConfig::from_env()?,
            },
            rate_limit: RateLimitConfig {
                auth_per_minute: parse_or("AUTH_RATE_LIMIT_PER_MINUTE", defaults.rate_limit.auth_per_minute)?,
                redis_url: non_empty("REDIS_URL"),
                trust_proxy_headers: parse_or("TRUST_PROXY_HEADERS", defaults.rate_limit.trust_proxy_headers)?,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let mut config = Config::default();
        config.api.host = "127.0.0.1".to_string();
        config.api.port = 9000;
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_default_is_local_development() {
        let config = Config::default();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(!config.api.production);
        assert!(config.allows_any_origin());
        assert!(config.jwt.secret.len() >= MIN_JWT_SECRET_LEN);
        assert_eq!(config.notifications.dispatch, DispatchMode::Inline);
    }

    #[test]
    fn test_parse_storage_backend() {
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert_eq!("Postgres".parse::<StorageBackend>().unwrap(), StorageBackend::Postgres);
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_parse_dispatch_mode() {
        assert_eq!("inline".parse::<DispatchMode>().unwrap(), DispatchMode::Inline);
        assert_eq!("OFF".parse::<DispatchMode>().unwrap(), DispatchMode::Off);
        assert!("worker".parse::<DispatchMode>().is_err());
    }
}
