//! Configuration for the SendGrid client.
//!
//! This module provides [`SendgridConfig`] and its builder, covering:
//!
//! - API key and endpoint
//! - Subuser impersonation (`On-Behalf-Of`)
//! - Connection pool limits
//! - Telemetry (enabled flag and span name)
//! - User agent customization
//!
//! Configuration can also be read from the environment with
//! [`SendgridConfig::from_env`].

use secrecy::{ExposeSecret, SecretString};
use std::str::FromStr;

pub mod error;

pub use error::ConfigError;

use crate::http::PoolConfig;
use crate::observability::TelemetryConfig;

/// Default SendGrid v3 mail-send endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// Default `User-Agent` header value.
pub const DEFAULT_USER_AGENT: &str =
    concat!("integrations-sendgrid/", env!("CARGO_PKG_VERSION"), ";rust");

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "SENDGRID_API_KEY";
/// Environment variable overriding the endpoint.
pub const ENV_ENDPOINT: &str = "SENDGRID_ENDPOINT";
/// Environment variable naming the subuser to impersonate.
pub const ENV_IMPERSONATE_SUBUSER: &str = "SENDGRID_IMPERSONATE_SUBUSER";
/// Environment variable toggling telemetry.
pub const ENV_TELEMETRY_ENABLED: &str = "SENDGRID_TELEMETRY_IS_ENABLED";
/// Environment variable overriding the span name.
pub const ENV_TELEMETRY_SPAN_NAME: &str = "SENDGRID_TELEMETRY_SPAN_NAME";
/// Environment variable for the connection ceiling.
pub const ENV_POOL_MAX_CONNECTIONS: &str = "SENDGRID_POOL_MAX_CONNECTIONS";
/// Environment variable for the idle connection cap.
pub const ENV_POOL_MAX_KEEPALIVE: &str = "SENDGRID_POOL_MAX_KEEPALIVE_CONNECTIONS";
/// Environment variable for the keep-alive expiry, in seconds.
pub const ENV_POOL_KEEPALIVE_EXPIRY: &str = "SENDGRID_POOL_KEEPALIVE_EXPIRY";

/// Configuration for the SendGrid client.
#[derive(Debug, Clone)]
pub struct SendgridConfig {
    /// API key issued by SendGrid.
    pub api_key: SecretString,

    /// Endpoint receiving mail-send requests.
    pub endpoint: String,

    /// Subuser to act on behalf of, sent as `On-Behalf-Of`.
    pub impersonate_subuser: Option<String>,

    /// Connection pool limits.
    pub pool: PoolConfig,

    /// Telemetry settings.
    pub telemetry: TelemetryConfig,

    /// `User-Agent` header value.
    pub user_agent: String,
}

impl SendgridConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use integrations_sendgrid::config::SendgridConfig;
    ///
    /// let config = SendgridConfig::builder()
    ///     .api_key("SG.secret")
    ///     .impersonate_subuser("John Smith")
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(config.endpoint, "https://api.sendgrid.com/v3/mail/send");
    /// ```
    pub fn builder() -> SendgridConfigBuilder {
        SendgridConfigBuilder::default()
    }

    /// Create a configuration from environment variables.
    ///
    /// Reads `SENDGRID_API_KEY` (required), `SENDGRID_ENDPOINT`,
    /// `SENDGRID_IMPERSONATE_SUBUSER`, `SENDGRID_TELEMETRY_IS_ENABLED`,
    /// `SENDGRID_TELEMETRY_SPAN_NAME` and the `SENDGRID_POOL_*` limits.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create a configuration from an arbitrary variable lookup.
    ///
    /// This is the logic behind [`SendgridConfig::from_env`], usable with any
    /// source of key/value pairs.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY).ok_or_else(|| ConfigError::Environment {
            variable: ENV_API_KEY.to_string(),
            message: "must be set".to_string(),
        })?;

        let mut builder = Self::builder().api_key(api_key);

        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            builder = builder.endpoint(endpoint);
        }

        if let Some(subuser) = lookup(ENV_IMPERSONATE_SUBUSER) {
            builder = builder.impersonate_subuser(subuser);
        }

        let mut telemetry = TelemetryConfig::default();
        if let Some(raw) = lookup(ENV_TELEMETRY_ENABLED) {
            telemetry.enabled = parse_flag(ENV_TELEMETRY_ENABLED, &raw)?;
        }
        if let Some(span_name) = lookup(ENV_TELEMETRY_SPAN_NAME) {
            telemetry.span_name = span_name;
        }

        let defaults = PoolConfig::default();
        let max_connections = match lookup(ENV_POOL_MAX_CONNECTIONS) {
            Some(raw) => parse_var(ENV_POOL_MAX_CONNECTIONS, &raw)?,
            None => defaults.max_connections(),
        };
        let max_keepalive = match lookup(ENV_POOL_MAX_KEEPALIVE) {
            Some(raw) => parse_var(ENV_POOL_MAX_KEEPALIVE, &raw)?,
            None => defaults.max_keepalive_connections(),
        };
        let keepalive_expiry = match lookup(ENV_POOL_KEEPALIVE_EXPIRY) {
            Some(raw) => parse_var(ENV_POOL_KEEPALIVE_EXPIRY, &raw)?,
            None => defaults.keepalive_expiry().as_secs_f64(),
        };

        builder
            .pool(PoolConfig::new(max_connections, max_keepalive, keepalive_expiry)?)
            .telemetry(telemetry)
            .build()
    }
}

fn parse_var<T: FromStr>(variable: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Environment {
        variable: variable.to_string(),
        message: format!("invalid value {:?}: {}", raw, e),
    })
}

fn parse_flag(variable: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Environment {
            variable: variable.to_string(),
            message: format!("expected a boolean, got {:?}", raw),
        }),
    }
}

/// Builder for creating SendGrid client configurations.
#[derive(Default)]
pub struct SendgridConfigBuilder {
    api_key: Option<String>,
    endpoint: Option<String>,
    impersonate_subuser: Option<String>,
    pool: Option<PoolConfig>,
    telemetry: Option<TelemetryConfig>,
    user_agent: Option<String>,
}

impl SendgridConfigBuilder {
    /// Set the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set a custom endpoint URL.
    ///
    /// Useful for pointing the client at a local mock server.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Impersonate a subuser via the `On-Behalf-Of` header.
    pub fn impersonate_subuser(mut self, subuser: impl Into<String>) -> Self {
        self.impersonate_subuser = Some(subuser.into());
        self
    }

    /// Set the connection pool limits.
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Set the telemetry configuration.
    pub fn telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Enable or disable telemetry.
    pub fn telemetry_enabled(mut self, enabled: bool) -> Self {
        self.telemetry.get_or_insert_with(TelemetryConfig::default).enabled = enabled;
        self
    }

    /// Set the name of the span emitted per send.
    pub fn span_name(mut self, name: impl Into<String>) -> Self {
        self.telemetry.get_or_insert_with(TelemetryConfig::default).span_name = name.into();
        self
    }

    /// Override the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the API key is missing or empty, or if the
    /// endpoint is not an absolute `http`/`https` URL.
    pub fn build(self) -> Result<SendgridConfig, ConfigError> {
        let api_key = self
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                field: "api_key".to_string(),
            })?;

        let endpoint = self.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let parsed = url::Url::parse(&endpoint).map_err(|e| ConfigError::Invalid {
            message: format!("invalid endpoint URL {:?}: {}", endpoint, e),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                message: format!("unsupported endpoint scheme: {}", parsed.scheme()),
            });
        }

        let telemetry = self.telemetry.unwrap_or_default();
        if telemetry.span_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "span name must not be empty".to_string(),
            });
        }

        Ok(SendgridConfig {
            api_key: SecretString::new(api_key),
            endpoint,
            impersonate_subuser: self.impersonate_subuser.filter(|s| !s.is_empty()),
            pool: self.pool.unwrap_or_default(),
            telemetry,
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }
}

impl SendgridConfig {
    /// The bearer token value sent in the `Authorization` header.
    pub(crate) fn bearer_token(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }
}
