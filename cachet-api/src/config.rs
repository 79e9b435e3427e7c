//! API Configuration Module
//!
//! Server-level settings: bind address, service root, CORS and the request
//! timeout. Loaded from environment variables with development defaults.
//! Cache definitions live in the TOML `CachetConfig` instead.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{ApiError, ApiResult, ErrorCode};

/// Default URL prefix of the entity service.
pub const DEFAULT_SERVICE_ROOT: &str = "/cachet.svc";

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Interface to bind.
    pub bind_host: String,

    /// Port to listen on.
    pub port: u16,

    /// URL prefix the service document, `$metadata` and operations live under.
    pub service_root: String,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Whole-request deadline enforced by the HTTP layer.
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            service_root: DEFAULT_SERVICE_ROOT.to_string(),
            cors_origins: Vec::new(), // Empty = allow all
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `CACHET_API_BIND`: Interface to bind (default: 0.0.0.0)
    /// - `PORT` or `CACHET_API_PORT`: Port (default: 3000)
    /// - `CACHET_SERVICE_ROOT`: Service prefix (default: /cachet.svc)
    /// - `CACHET_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `CACHET_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `CACHET_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `CACHET_REQUEST_TIMEOUT_SECS`: Request deadline (default: 60)
    pub fn from_env() -> ApiResult<Self> {
        let defaults = Self::default();

        let bind_host = std::env::var("CACHET_API_BIND").unwrap_or(defaults.bind_host);

        let port = match std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("CACHET_API_PORT").ok())
        {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                ApiError::new(
                    ErrorCode::InvalidInput,
                    format!("Invalid port value: {}", raw),
                )
            })?,
            None => defaults.port,
        };

        let service_root = std::env::var("CACHET_SERVICE_ROOT")
            .map(|root| normalize_service_root(&root))
            .unwrap_or(defaults.service_root);

        let cors_origins = std::env::var("CACHET_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("CACHET_CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let cors_max_age_secs = std::env::var("CACHET_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cors_max_age_secs);

        let request_timeout = std::env::var("CACHET_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|secs: &u64| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Ok(Self {
            bind_host,
            port,
            service_root,
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
            request_timeout,
        })
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::new(
                ErrorCode::InvalidInput,
                format!("Invalid bind address {}: {}", addr, e),
            )
        })
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }
}

/// Leading slash, no trailing slash; an empty root becomes `/`.
fn normalize_service_root(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.service_root, "/cachet.svc");
        assert!(config.cors_origins.is_empty());
        assert!(!config.cors_allow_credentials);
        assert_eq!(config.cors_max_age_secs, 86400);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_bind_addr() -> ApiResult<()> {
        let config = ApiConfig {
            bind_host: "127.0.0.1".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.bind_addr()?.to_string(), "127.0.0.1:8080");

        let bad = ApiConfig {
            bind_host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(bad.bind_addr().is_err());
        Ok(())
    }

    #[test]
    fn test_is_production() {
        let mut config = ApiConfig::default();
        assert!(!config.is_production());

        config.cors_origins = vec!["https://cachet.run".to_string()];
        assert!(config.is_production());
    }

    #[test]
    fn test_normalize_service_root() {
        assert_eq!(normalize_service_root("cachet.svc"), "/cachet.svc");
        assert_eq!(normalize_service_root("/odata/v4/"), "/odata/v4");
        assert_eq!(normalize_service_root("/"), "/");
        assert_eq!(normalize_service_root(""), "/");
    }
}
