//! Observability: per-send spans, span providers and logging setup.

pub mod logging;
#[cfg(feature = "opentelemetry")]
pub mod otel;
pub mod spans;
pub mod tracing_bridge;

pub use logging::{init_logging, LogConfig, LogLevel};
#[cfg(feature = "opentelemetry")]
pub use otel::OpenTelemetryProvider;
pub use spans::{
    attributes, AttributeValue, Attributes, FinishedSpan, InMemoryTracerProvider,
    NoopTracerProvider, RecordedException, SpanGuard, SpanStatus, Telemetry, TelemetryConfig,
    TelemetrySpan, TracerProvider, CANCELLED_MESSAGE, DEFAULT_SPAN_NAME,
};
pub use tracing_bridge::TracingSpanProvider;
