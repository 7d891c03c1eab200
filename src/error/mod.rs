//! Error types for the SendGrid integration.
//!
//! Errors are grouped by where they originate so callers can tell a
//! misconfigured client apart from a closed session or a failed request:
//!
//! - Configuration errors (invalid pool limits, missing API key, bad endpoint)
//! - Session errors (the transport was closed before the call)
//! - Transport errors (connection refused, DNS failure, timeouts)
//! - Serialization errors (the mail payload could not be turned into JSON)
//!
//! HTTP error responses (4xx/5xx) are *not* errors at this layer: they are
//! returned as a normal [`SendgridResponse`](crate::http::SendgridResponse).
//!
//! # Examples
//!
//! ```rust
//! use integrations_sendgrid::error::SendgridError;
//!
//! fn describe(error: &SendgridError) {
//!     if error.is_session_closed() {
//!         println!("session closed, build a new client");
//!     } else if error.is_timeout() {
//!         println!("request timed out: {}", error);
//!     }
//! }
//! ```

use thiserror::Error;

use crate::config::ConfigError;

/// Message carried by [`SendgridError::SessionClosed`] and recorded on spans.
pub const SESSION_CLOSED_MESSAGE: &str = "Session not initialized";

/// Top-level error type for the SendGrid integration.
#[derive(Debug, Error)]
pub enum SendgridError {
    /// Configuration-related errors.
    ///
    /// Raised while building a client or pool from invalid settings.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The client session was closed before the request could be issued.
    ///
    /// No network I/O was attempted. The client itself is still usable for
    /// inspection but its session will not reopen.
    #[error("{message}")]
    SessionClosed {
        /// Description of the session state.
        message: String,
    },

    /// Transport and network errors.
    ///
    /// The underlying `reqwest` error is kept as the source, unchanged.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport error.
        message: String,
        /// Underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        /// Whether the failure was a timeout.
        timeout: bool,
        /// Whether the failure happened while connecting.
        connect: bool,
    },

    /// The mail payload could not be serialized.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// Underlying serde error, if any.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A value was rejected before a request was built.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },
}

impl SendgridError {
    /// Create the error returned when sending on a closed session.
    pub fn session_closed() -> Self {
        SendgridError::SessionClosed {
            message: SESSION_CLOSED_MESSAGE.to_string(),
        }
    }

    /// Create a configuration error without an underlying source.
    pub fn configuration(message: impl Into<String>) -> Self {
        SendgridError::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a validation error for the given field.
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        SendgridError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Stable type name of this error, used for the `error.type` span attribute.
    pub fn error_type(&self) -> &'static str {
        match self {
            SendgridError::Configuration { .. } => "ConfigurationError",
            SendgridError::SessionClosed { .. } => "SessionClosedException",
            SendgridError::Transport { timeout: true, .. } => "TimeoutError",
            SendgridError::Transport { connect: true, .. } => "ConnectError",
            SendgridError::Transport { .. } => "TransportError",
            SendgridError::Serialization { .. } => "SerializationError",
            SendgridError::Validation { .. } => "ValidationError",
        }
    }

    /// Returns `true` if the session was closed before the call.
    pub fn is_session_closed(&self) -> bool {
        matches!(self, SendgridError::SessionClosed { .. })
    }

    /// Returns `true` if this is a transport-level timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SendgridError::Transport { timeout: true, .. })
    }

    /// Returns `true` if the transport could not connect.
    pub fn is_connect(&self) -> bool {
        matches!(self, SendgridError::Transport { connect: true, .. })
    }

    /// Returns `true` for transport-level failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, SendgridError::Transport { .. })
    }
}

impl From<reqwest::Error> for SendgridError {
    fn from(error: reqwest::Error) -> Self {
        SendgridError::Transport {
            message: error.to_string(),
            timeout: error.is_timeout(),
            connect: error.is_connect(),
            source: Some(Box::new(error)),
        }
    }
}

impl From<serde_json::Error> for SendgridError {
    fn from(error: serde_json::Error) -> Self {
        SendgridError::Serialization {
            message: error.to_string(),
            source: Some(error),
        }
    }
}

impl From<ConfigError> for SendgridError {
    fn from(error: ConfigError) -> Self {
        SendgridError::Configuration {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }
}

/// Result type for SendGrid operations.
pub type SendgridResult<T> = Result<T, SendgridError>;
