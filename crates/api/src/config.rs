use std::str::FromStr;

use kindred_core::media::{DEFAULT_MAX_PHOTOS_PER_USER, DEFAULT_MAX_UPLOAD_BYTES};
use kindred_core::rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECS};

use crate::auth::jwt::JwtConfig;
use crate::service::Service;

/// A setting that was present but could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in the environment")]
    Missing(&'static str),

    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Fixed-window rate limit settings.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub window_secs: u64,
    pub max_requests: u32,
    /// Use the first `X-Forwarded-For` hop as the client address.
    pub trust_forwarded_for: bool,
}

/// Photo upload and storage settings.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub storage_root: String,
    pub max_upload_bytes: usize,
    pub max_photos_per_user: i64,
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub service: Service,
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: the service's own port).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on waiting for background tasks after the listener stops.
    pub shutdown_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub media: MediaConfig,
}

impl ServerConfig {
    /// Load configuration for `service` from environment variables.
    ///
    /// | Env Var                     | Default                  |
    /// |-----------------------------|--------------------------|
    /// | `HOST`                      | `0.0.0.0`                |
    /// | `PORT`                      | per service              |
    /// | `CORS_ORIGINS`              | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                     |
    /// | `RATE_LIMIT_ENABLED`        | per service              |
    /// | `RATE_LIMIT_WINDOW_SECS`    | `900`                    |
    /// | `RATE_LIMIT_MAX_REQUESTS`   | `100`                    |
    /// | `RATE_LIMIT_TRUST_PROXY`    | `false`                  |
    /// | `MEDIA_STORAGE_ROOT`        | `./storage/photos`       |
    /// | `MEDIA_MAX_UPLOAD_BYTES`    | `10485760`               |
    /// | `MEDIA_MAX_PHOTOS_PER_USER` | `6`                      |
    pub fn from_env(service: Service) -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = env_or("PORT", service.default_port())?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let rate_limit = RateLimitConfig {
            enabled: env_or("RATE_LIMIT_ENABLED", service.rate_limited_by_default())?,
            window_secs: env_or("RATE_LIMIT_WINDOW_SECS", DEFAULT_WINDOW_SECS)?,
            max_requests: env_or("RATE_LIMIT_MAX_REQUESTS", DEFAULT_MAX_REQUESTS)?,
            trust_forwarded_for: env_or("RATE_LIMIT_TRUST_PROXY", false)?,
        };
        if rate_limit.window_secs == 0 || rate_limit.max_requests == 0 {
            return Err(ConfigError::Invalid {
                name: "RATE_LIMIT_WINDOW_SECS/RATE_LIMIT_MAX_REQUESTS",
                value: format!("{}/{}", rate_limit.window_secs, rate_limit.max_requests),
                reason: "must both be positive".into(),
            });
        }

        let media = MediaConfig {
            storage_root: std::env::var("MEDIA_STORAGE_ROOT")
                .unwrap_or_else(|_| "./storage/photos".into()),
            max_upload_bytes: env_or("MEDIA_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            max_photos_per_user: env_or("MEDIA_MAX_PHOTOS_PER_USER", DEFAULT_MAX_PHOTOS_PER_USER)?,
        };

        Ok(Self {
            service,
            host,
            port,
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30)?,
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30)?,
            jwt: JwtConfig::from_env()?,
            rate_limit,
            media,
        })
    }
}

/// Read and parse `name`, falling back to `default` when unset.
pub(crate) fn env_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn unset_variable_uses_default() {
        let value: u64 = env_or("KINDRED_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn unparsable_variable_is_reported() {
        std::env::set_var("KINDRED_TEST_BAD_PORT", "not-a-port");
        let result: Result<u16, _> = env_or("KINDRED_TEST_BAD_PORT", 1);
        assert_matches!(result, Err(ConfigError::Invalid { name: "KINDRED_TEST_BAD_PORT", .. }));
    }
}
