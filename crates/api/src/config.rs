use std::net::IpAddr;
use std::str::FromStr;

use scout_core::rate_limit::{RateLimitPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW_SECS};
use scout_core::tokens::EXTENSION_TOKEN_DAYS;

use crate::auth::jwt::JwtConfig;

/// A configuration variable was missing or could not be parsed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in the environment")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Which token store implementation the server runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// The EIP REST data API (production).
    Rest,
    /// In-process store for local development. Nothing survives a restart.
    Memory,
}

/// Connection details for the External Identity Provider.
#[derive(Debug, Clone)]
pub struct EipConfig {
    pub url: String,
    /// Public key used for the password-grant auth endpoint.
    pub anon_key: String,
    /// Privileged key used for all data API calls.
    pub service_role_key: String,
}

/// Server configuration loaded from environment variables.
///
/// Secrets have no defaults: a missing `EIP_*` variable or `JWT_SECRET` is a
/// startup error.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Reverse proxies whose `X-Forwarded-For` header is believed. Requests
    /// from any other peer are keyed on the socket address.
    pub trusted_proxies: Vec<IpAddr>,
    pub store_backend: StoreBackend,
    /// Present whenever `store_backend` is [`StoreBackend::Rest`].
    pub eip: Option<EipConfig>,
    /// JWT token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitPolicy,
    pub extension_token_days: i64,
    /// Lifetime of `/verify` sessions in minutes.
    pub session_ttl_mins: i64,
    /// Subscription cache TTL. `0` disables caching.
    pub subscription_cache_secs: u64,
    /// Admin-flag mirror. `None` disables the mirror and reconciliation job.
    pub mirror_database_url: Option<String>,
    pub reconcile_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `3000`                  |
    /// | `CORS_ORIGINS`            | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `TRUSTED_PROXIES`         | empty (comma-separated) |
    /// | `SCOUT_STORE`             | `rest` (`memory`)       |
    /// | `EIP_URL`                 | required for `rest`     |
    /// | `EIP_ANON_KEY`            | required for `rest`     |
    /// | `EIP_SERVICE_ROLE_KEY`    | required for `rest`     |
    /// | `JWT_SECRET`              | required                |
    /// | `JWT_ACCESS_EXPIRY_MINS`  | `60`                    |
    /// | `JWT_REFRESH_EXPIRY_DAYS` | `7`                     |
    /// | `RATE_LIMIT_MAX_ATTEMPTS` | `10`                    |
    /// | `RATE_LIMIT_WINDOW_SECS`  | `300`                   |
    /// | `EXTENSION_TOKEN_DAYS`    | `30`                    |
    /// | `SESSION_TTL_MINS`        | `720`                   |
    /// | `SUBSCRIPTION_CACHE_SECS` | `0`                     |
    /// | `MIRROR_DATABASE_URL`     | unset (mirror disabled) |
    /// | `RECONCILE_INTERVAL_SECS` | `900`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let host = env.get("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = env.parse("PORT", 3000u16)?;

        let cors_origins: Vec<String> = env
            .get("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        for origin in &cors_origins {
            if origin.parse::<axum::http::HeaderValue>().is_err() {
                return Err(ConfigError::Invalid {
                    var: "CORS_ORIGINS",
                    value: origin.clone(),
                });
            }
        }

        let request_timeout_secs = env.parse("REQUEST_TIMEOUT_SECS", 30u64)?;

        let trusted_proxies = env
            .get("TRUSTED_PROXIES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<IpAddr>().map_err(|_| ConfigError::Invalid {
                    var: "TRUSTED_PROXIES",
                    value: s.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let store_backend = match env.get("SCOUT_STORE").as_deref() {
            None | Some("rest") => StoreBackend::Rest,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "SCOUT_STORE",
                    value: other.to_string(),
                })
            }
        };

        let eip = match store_backend {
            StoreBackend::Rest => Some(EipConfig {
                url: env.require("EIP_URL")?,
                anon_key: env.require("EIP_ANON_KEY")?,
                service_role_key: env.require("EIP_SERVICE_ROLE_KEY")?,
            }),
            StoreBackend::Memory => None,
        };

        let jwt = JwtConfig {
            secret: env.require("JWT_SECRET")?,
            access_token_expiry_mins: env
                .parse("JWT_ACCESS_EXPIRY_MINS", crate::auth::jwt::DEFAULT_ACCESS_EXPIRY_MINS)?,
            refresh_token_expiry_days: env
                .parse("JWT_REFRESH_EXPIRY_DAYS", crate::auth::jwt::DEFAULT_REFRESH_EXPIRY_DAYS)?,
        };

        let rate_limit = RateLimitPolicy {
            max_attempts: env.parse("RATE_LIMIT_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            window_secs: env.parse("RATE_LIMIT_WINDOW_SECS", DEFAULT_WINDOW_SECS)?,
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            trusted_proxies,
            store_backend,
            eip,
            jwt,
            rate_limit,
            extension_token_days: env.parse("EXTENSION_TOKEN_DAYS", EXTENSION_TOKEN_DAYS)?,
            session_ttl_mins: env.parse("SESSION_TTL_MINS", 720i64)?,
            subscription_cache_secs: env.parse("SUBSCRIPTION_CACHE_SECS", 0u64)?,
            mirror_database_url: env.get("MIRROR_DATABASE_URL"),
            reconcile_interval_secs: env.parse("RECONCILE_INTERVAL_SECS", 900u64)?,
        })
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Non-empty value of `var`, if set.
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var).filter(|v| !v.trim().is_empty())
    }

    fn require(&self, var: &'static str) -> Result<String, ConfigError> {
        self.get(var).ok_or(ConfigError::Missing(var))
    }

    fn parse<T: FromStr>(&self, var: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(var) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { var, value }),
        }
    }
}
