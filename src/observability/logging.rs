//! Logging configuration and subscriber setup.

use std::fmt;
use tracing_subscriber::EnvFilter;

use crate::error::{SendgridError, SendgridResult};

/// Log level enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    /// Trace level - most verbose.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
    /// Off - no logging.
    Off,
}

impl LogLevel {
    /// Filter directive for this level.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_directive().to_uppercase())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "none" => Ok(LogLevel::Off),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Minimum log level, used when no filter is given and `RUST_LOG` is unset.
    pub level: LogLevel,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Include the event target (module path).
    pub include_targets: bool,
    /// Explicit `EnvFilter` directives, e.g. `integrations_sendgrid=debug`.
    pub filter: Option<String>,
}

impl LogConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder.
    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }

    /// Resolve the filter: explicit directives, then `RUST_LOG`, then the level.
    pub fn env_filter(&self) -> SendgridResult<EnvFilter> {
        let filter = match &self.filter {
            Some(directives) => EnvFilter::try_new(directives),
            None => EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(self.level.as_directive())),
        };

        filter.map_err(|e| SendgridError::Configuration {
            message: format!("Invalid log filter: {}", e),
            source: Some(Box::new(e)),
        })
    }
}

/// Builder for logging configuration.
#[derive(Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    /// Sets the log level.
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// Enables JSON output.
    pub fn json(mut self, json: bool) -> Self {
        self.config.json = json;
        self
    }

    /// Sets whether targets are included.
    pub fn include_targets(mut self, include: bool) -> Self {
        self.config.include_targets = include;
        self
    }

    /// Sets explicit filter directives.
    pub fn filter(mut self, directives: impl Into<String>) -> Self {
        self.config.filter = Some(directives.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Install a global `tracing` subscriber.
///
/// # Errors
///
/// Fails if the filter is invalid or a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> SendgridResult<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter()?)
        .with_target(config.include_targets);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| SendgridError::Configuration {
        message: format!("Failed to install log subscriber: {}", e),
        source: Some(e),
    })
}
