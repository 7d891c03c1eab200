//! # integrations-sendgrid
//!
//! Async client for the SendGrid v3 mail-send API.
//!
//! The client keeps one pooled HTTP session for its whole life and wraps
//! every send in a span tagged with request and response facts. Spans go to
//! an injected [`TracerProvider`]: the `tracing` bridge, an OpenTelemetry
//! tracer (feature `opentelemetry`), an in-memory collector, or nothing.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use integrations_sendgrid::{
//!     Attachment, Mail, SendgridApi, SendgridClient, SendgridConfig, TracingSpanProvider,
//! };
//!
//! # async fn run() -> integrations_sendgrid::Result<()> {
//! let config = SendgridConfig::from_env()?;
//! let client = SendgridClient::with_provider(config, Arc::new(TracingSpanProvider))?;
//!
//! let mail = Mail::builder()
//!     .from("billing@example.com")
//!     .to("customer@example.com")
//!     .subject("Your invoice")
//!     .text("Invoice attached.")
//!     .attachment(Attachment::from_bytes("invoice.pdf", b"%PDF-1.7"))
//!     .build()?;
//!
//! let response = client.send(&mail).await?;
//! if !response.is_success() {
//!     eprintln!("rejected: {}", response.status_code());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod mail;
pub mod observability;

pub use crate::client::{SendgridApi, SendgridClient, SendgridClientBuilder};
pub use crate::config::{ConfigError, SendgridConfig, SendgridConfigBuilder};
pub use crate::error::{SendgridError, SendgridResult};
pub use crate::http::{ClientSession, ConnectionPool, PoolConfig, SendgridResponse};
pub use crate::mail::{
    Attachment, Content, EmailAddress, Mail, MailBuilder, MailPayload, Personalization,
};
pub use crate::observability::{
    init_logging, InMemoryTracerProvider, LogConfig, NoopTracerProvider, TelemetryConfig,
    TracerProvider, TracingSpanProvider,
};
#[cfg(feature = "opentelemetry")]
pub use crate::observability::OpenTelemetryProvider;

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, SendgridError>;
