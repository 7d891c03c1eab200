//! Connection pool configuration and client-session factory.
//!
//! A [`ConnectionPool`] holds transport-tuning limits and manufactures
//! [`ClientSession`]s configured with them. Sessions are independent: the
//! pool does not keep track of the sessions it hands out, they only share the
//! limits they were built with.

use http::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use std::fmt;
use std::time::Duration;

use super::session::ClientSession;
use crate::config::{ConfigError, DEFAULT_USER_AGENT};
use crate::error::{SendgridError, SendgridResult};

/// Limits applied to every session created by a [`ConnectionPool`].
///
/// Values are validated on construction and cannot be changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolConfig {
    max_connections: usize,
    max_keepalive_connections: usize,
    keepalive_expiry: Duration,
}

impl PoolConfig {
    /// Default ceiling on concurrent connections.
    pub const DEFAULT_MAX_CONNECTIONS: usize = 10;
    /// Default number of idle connections kept alive.
    pub const DEFAULT_MAX_KEEPALIVE_CONNECTIONS: usize = 5;
    /// Default idle lifetime of a pooled connection, in seconds.
    pub const DEFAULT_KEEPALIVE_EXPIRY_SECS: f64 = 5.0;

    /// Create validated pool limits.
    ///
    /// # Arguments
    ///
    /// * `max_connections` - Maximum concurrent connections (must be at least 1)
    /// * `max_keepalive_connections` - Maximum idle connections kept per host
    /// * `keepalive_expiry_secs` - Idle lifetime of a connection, in seconds
    ///
    /// A keep-alive cap above `max_connections` is accepted even though the
    /// extra idle slots can never be filled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `max_connections` is zero or the
    /// expiry is negative, NaN or too large.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use integrations_sendgrid::http::PoolConfig;
    ///
    /// let limits = PoolConfig::new(2, 1, 1.0).unwrap();
    /// assert_eq!(limits.max_connections(), 2);
    ///
    /// assert!(PoolConfig::new(0, 1, 1.0).is_err());
    /// assert!(PoolConfig::new(2, 1, -1.0).is_err());
    /// ```
    pub fn new(
        max_connections: usize,
        max_keepalive_connections: usize,
        keepalive_expiry_secs: f64,
    ) -> Result<Self, ConfigError> {
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                message: "max_connections must be at least 1".to_string(),
            });
        }

        let keepalive_expiry =
            Duration::try_from_secs_f64(keepalive_expiry_secs).map_err(|_| ConfigError::Invalid {
                message: format!(
                    "keepalive_expiry must be a non-negative number of seconds, got {}",
                    keepalive_expiry_secs
                ),
            })?;

        Ok(Self {
            max_connections,
            max_keepalive_connections,
            keepalive_expiry,
        })
    }

    /// Maximum number of concurrent connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Maximum number of idle connections kept alive per host.
    pub fn max_keepalive_connections(&self) -> usize {
        self.max_keepalive_connections
    }

    /// How long an idle connection stays in the pool before being closed.
    pub fn keepalive_expiry(&self) -> Duration {
        self.keepalive_expiry
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            max_keepalive_connections: Self::DEFAULT_MAX_KEEPALIVE_CONNECTIONS,
            keepalive_expiry: Duration::from_secs_f64(Self::DEFAULT_KEEPALIVE_EXPIRY_SECS),
        }
    }
}

/// Factory for configured HTTP client sessions.
///
/// # Examples
///
/// ```rust
/// use integrations_sendgrid::http::{ConnectionPool, PoolConfig};
///
/// let pool = ConnectionPool::new(PoolConfig::new(2, 1, 1.0).unwrap());
/// assert_eq!(
///     pool.to_string(),
///     "ConnectionPool(max_connections=2, max_keepalive=1, keepalive_expiry=1.0)"
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConnectionPool {
    limits: PoolConfig,
}

impl ConnectionPool {
    /// Create a pool with the given limits.
    pub fn new(limits: PoolConfig) -> Self {
        Self { limits }
    }

    /// Validate raw limits and create a pool from them.
    ///
    /// # Errors
    ///
    /// See [`PoolConfig::new`].
    pub fn configure(
        max_connections: usize,
        max_keepalive_connections: usize,
        keepalive_expiry_secs: f64,
    ) -> Result<Self, ConfigError> {
        PoolConfig::new(max_connections, max_keepalive_connections, keepalive_expiry_secs)
            .map(Self::new)
    }

    /// The limits applied to sessions created by this pool.
    pub fn limits(&self) -> &PoolConfig {
        &self.limits
    }

    /// Create a new session carrying `headers`.
    ///
    /// Caller headers take precedence; `Accept` and `User-Agent` are filled
    /// in with defaults when missing. No sockets are opened until the first
    /// request.
    ///
    /// # Errors
    ///
    /// Returns [`SendgridError::Configuration`] only if the HTTP backend
    /// cannot be initialised (for example when TLS roots fail to load).
    pub fn create_client(&self, headers: &HeaderMap) -> SendgridResult<ClientSession> {
        let mut merged = headers.clone();
        for (name, value) in default_headers() {
            if let Some(name) = name {
                merged.entry(name).or_insert(value);
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(merged.clone())
            .pool_max_idle_per_host(self.limits.max_keepalive_connections)
            .pool_idle_timeout(self.limits.keepalive_expiry)
            .build()
            .map_err(|e| SendgridError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(Box::new(e)),
            })?;

        tracing::debug!(pool = %self, headers = merged.len(), "created client session");

        Ok(ClientSession::new(client, merged, self.limits))
    }
}

impl fmt::Display for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConnectionPool(max_connections={}, max_keepalive={}, keepalive_expiry={:?})",
            self.limits.max_connections,
            self.limits.max_keepalive_connections,
            self.limits.keepalive_expiry.as_secs_f64()
        )
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE};

    fn pool() -> ConnectionPool {
        ConnectionPool::configure(2, 1, 1.0).unwrap()
    }

    #[test]
    fn test_pool_config_default() {
        let pool = ConnectionPool::default();
        assert_eq!(pool.limits().max_connections(), 10);
        assert_eq!(pool.limits().max_keepalive_connections(), 5);
        assert_eq!(pool.limits().keepalive_expiry(), Duration::from_secs(5));
    }

    #[test]
    fn test_pool_config_custom() {
        let pool = ConnectionPool::configure(5, 2, 3.0).unwrap();
        assert_eq!(pool.limits().max_connections(), 5);
        assert_eq!(pool.limits().max_keepalive_connections(), 2);
        assert_eq!(pool.limits().keepalive_expiry(), Duration::from_secs(3));
    }

    #[test]
    fn test_pool_config_rejects_invalid_limits() {
        assert!(matches!(
            PoolConfig::new(0, 0, 1.0),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(PoolConfig::new(1, 0, -0.5).is_err());
        assert!(PoolConfig::new(1, 0, f64::NAN).is_err());
        assert!(PoolConfig::new(1, 0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_pool_config_accepts_unusual_combinations() {
        let limits = PoolConfig::new(1, 8, 0.0).unwrap();
        assert_eq!(limits.max_keepalive_connections(), 8);
        assert_eq!(limits.keepalive_expiry(), Duration::ZERO);
    }

    #[test]
    fn test_create_client_keeps_caller_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer test"));
        headers.insert(COOKIE, HeaderValue::from_static("test_cookie=value"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let session = pool().create_client(&headers).unwrap();
        let session_headers = session.headers();

        assert_eq!(session_headers[AUTHORIZATION], "Bearer test");
        assert_eq!(session_headers[COOKIE], "test_cookie=value");
        assert_eq!(session_headers[CONTENT_TYPE], "application/json");
        assert_eq!(session_headers[ACCEPT], "*/*");
        assert_eq!(session_headers[USER_AGENT], DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_create_client_does_not_overwrite_defaults_supplied_by_caller() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("custom-agent/1.0"));

        let session = pool().create_client(&headers).unwrap();

        assert_eq!(session.headers()[ACCEPT], "application/json");
        assert_eq!(session.headers()[USER_AGENT], "custom-agent/1.0");
        assert_eq!(session.headers().get_all(ACCEPT).iter().count(), 1);
    }

    #[test]
    fn test_create_client_uses_configured_limits() {
        let pool = pool();
        let session = pool.create_client(&HeaderMap::new()).unwrap();

        assert_eq!(session.limits(), pool.limits());
        assert_eq!(session.available_slots(), 2);
        assert!(!session.is_closed());
    }

    #[test]
    fn test_sessions_are_independent() {
        let pool = pool();
        let first = pool.create_client(&HeaderMap::new()).unwrap();
        let second = pool.create_client(&HeaderMap::new()).unwrap();

        first.close();

        assert!(first.is_closed());
        assert!(!second.is_closed());
    }

    #[test]
    fn test_pool_string_representation() {
        let pool_str = pool().to_string();
        assert!(pool_str.contains("ConnectionPool"));
        assert!(pool_str.contains("max_connections=2"));
        assert!(pool_str.contains("max_keepalive=1"));
        assert!(pool_str.contains("keepalive_expiry=1.0"));
    }
}
