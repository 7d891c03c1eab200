//! Span abstraction used to trace each send.
//!
//! A [`TracerProvider`] is injected into the client and creates one
//! [`TelemetrySpan`] per request. Spans are finalized exactly once through a
//! [`SpanGuard`]; a guard dropped before being ended (a cancelled send) marks
//! its span as failed and ends it.
//!
//! Span operations never fail. Tagging must not be able to replace the error
//! a caller is about to receive.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Default name of the span emitted per send.
pub const DEFAULT_SPAN_NAME: &str = "sendgrid.send";

/// Status message of a span whose send was dropped before completing.
pub const CANCELLED_MESSAGE: &str = "send cancelled";

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Whether spans are emitted at all.
    pub enabled: bool,
    /// Name given to the span of each send.
    pub span_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            span_name: DEFAULT_SPAN_NAME.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables telemetry.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Sets the span name.
    pub fn with_span_name(mut self, name: impl Into<String>) -> Self {
        self.span_name = name.into();
        self
    }
}

/// Value of a span attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// String value.
    String(String),
    /// Integer value.
    Int(i64),
    /// Boolean value.
    Bool(bool),
    /// Floating point value.
    Float(f64),
    /// List of strings.
    StringArray(Vec<String>),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => f.write_str(s),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::StringArray(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<u16> for AttributeValue {
    fn from(value: u16) -> Self {
        AttributeValue::Int(i64::from(value))
    }
}

impl From<usize> for AttributeValue {
    fn from(value: usize) -> Self {
        AttributeValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(value: Vec<String>) -> Self {
        AttributeValue::StringArray(value)
    }
}

/// Span attributes keyed by name.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Build an [`Attributes`] map from key/value pairs.
pub fn attributes<I, K, V>(pairs: I) -> Attributes
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<AttributeValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Status of a span.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SpanStatus {
    /// No status recorded yet.
    #[default]
    Unset,
    /// Completed successfully.
    Ok,
    /// Failed, with a description.
    Error {
        /// What went wrong.
        message: String,
    },
}

impl SpanStatus {
    /// Error status with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        SpanStatus::Error {
            message: message.into(),
        }
    }

    /// Returns `false` only for error statuses.
    pub fn is_ok(&self) -> bool {
        !matches!(self, SpanStatus::Error { .. })
    }

    /// Error description, if any.
    pub fn description(&self) -> Option<&str> {
        match self {
            SpanStatus::Error { message } => Some(message),
            _ => None,
        }
    }
}

/// An error recorded on a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedException {
    /// Stable type name of the error.
    pub exception_type: String,
    /// Display form of the error.
    pub message: String,
    /// Display forms of the error's sources, outermost first.
    pub causes: Vec<String>,
}

impl RecordedException {
    /// Capture an error and its source chain.
    pub fn capture(exception_type: &str, error: &dyn std::error::Error) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        Self {
            exception_type: exception_type.to_string(),
            message: error.to_string(),
            causes,
        }
    }
}

/// A span as seen by the send pipeline.
pub trait TelemetrySpan: Send {
    /// Set one attribute, replacing any previous value for the key.
    fn set_attribute(&mut self, key: &str, value: AttributeValue);

    /// Set several attributes.
    fn set_attributes(&mut self, attributes: Attributes) {
        for (key, value) in attributes {
            self.set_attribute(&key, value);
        }
    }

    /// Set the span status.
    fn set_status(&mut self, status: SpanStatus);

    /// Record an error on the span.
    fn record_exception(&mut self, exception_type: &str, error: &dyn std::error::Error);

    /// Finalize the span. Calls after the first are ignored.
    fn end(&mut self);

    /// Whether [`end`](Self::end) has been called.
    fn is_ended(&self) -> bool;
}

/// Creates spans.
pub trait TracerProvider: Send + Sync {
    /// Start a span with initial attributes.
    ///
    /// # Arguments
    ///
    /// * `name` - Span name
    /// * `attributes` - Attributes recorded when the span starts
    ///
    /// # Returns
    ///
    /// A started span. It is finished once [`TelemetrySpan::end`] is called.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use integrations_sendgrid::observability::{
    ///     Attributes, InMemoryTracerProvider, SpanStatus, TracerProvider,
    /// };
    ///
    /// let provider = InMemoryTracerProvider::new();
    /// let mut span = provider.create_span("mail.send", Attributes::new());
    /// span.set_status(SpanStatus::Ok);
    /// span.end();
    ///
    /// assert_eq!(provider.finished_spans()[0].name, "mail.send");
    /// ```
    fn create_span(&self, name: &str, attributes: Attributes) -> Box<dyn TelemetrySpan>;
}

/// Provider whose spans record nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracerProvider;

impl TracerProvider for NoopTracerProvider {
    fn create_span(&self, _name: &str, _attributes: Attributes) -> Box<dyn TelemetrySpan> {
        Box::new(NoopSpan::default())
    }
}

#[derive(Debug, Default)]
struct NoopSpan {
    ended: bool,
}

impl TelemetrySpan for NoopSpan {
    fn set_attribute(&mut self, _key: &str, _value: AttributeValue) {}

    fn set_status(&mut self, _status: SpanStatus) {}

    fn record_exception(&mut self, _exception_type: &str, _error: &dyn std::error::Error) {}

    fn end(&mut self) {
        self.ended = true;
    }

    fn is_ended(&self) -> bool {
        self.ended
    }
}

/// A span that has been finalized by an [`InMemoryTracerProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedSpan {
    /// Unique span identifier.
    pub span_id: String,
    /// Span name.
    pub name: String,
    /// Attributes at the time the span ended.
    pub attributes: Attributes,
    /// Final status.
    pub status: SpanStatus,
    /// Errors recorded on the span.
    pub exceptions: Vec<RecordedException>,
    /// When the span started.
    pub start_time: DateTime<Utc>,
    /// When the span ended.
    pub end_time: DateTime<Utc>,
}

impl FinishedSpan {
    /// Look up an attribute.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Time between start and end.
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }
}

/// Provider that keeps finished spans in memory.
///
/// Clones share the same storage, so a clone can be handed to a client while
/// the original is used to inspect what was recorded.
///
/// # Examples
///
/// ```rust
/// use integrations_sendgrid::observability::{
///     attributes, InMemoryTracerProvider, SpanStatus, TracerProvider,
/// };
///
/// let provider = InMemoryTracerProvider::new();
/// let mut span = provider.create_span("test", attributes([("k", 1i64)]));
/// span.set_status(SpanStatus::error("boom"));
/// span.end();
///
/// let spans = provider.finished_spans();
/// assert_eq!(spans.len(), 1);
/// assert_eq!(spans[0].status.description(), Some("boom"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryTracerProvider {
    finished: Arc<Mutex<Vec<FinishedSpan>>>,
}

impl InMemoryTracerProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all spans finalized so far, in end order.
    pub fn finished_spans(&self) -> Vec<FinishedSpan> {
        self.finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget all finished spans.
    pub fn reset(&self) {
        self.finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl TracerProvider for InMemoryTracerProvider {
    fn create_span(&self, name: &str, attributes: Attributes) -> Box<dyn TelemetrySpan> {
        Box::new(InMemorySpan {
            span_id: uuid::Uuid::new_v4().simple().to_string(),
            name: name.to_string(),
            attributes,
            status: SpanStatus::Unset,
            exceptions: Vec::new(),
            start_time: Utc::now(),
            ended: false,
            sink: Arc::clone(&self.finished),
        })
    }
}

struct InMemorySpan {
    span_id: String,
    name: String,
    attributes: Attributes,
    status: SpanStatus,
    exceptions: Vec<RecordedException>,
    start_time: DateTime<Utc>,
    ended: bool,
    sink: Arc<Mutex<Vec<FinishedSpan>>>,
}

impl TelemetrySpan for InMemorySpan {
    fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        if !self.ended {
            self.attributes.insert(key.to_string(), value);
        }
    }

    fn set_status(&mut self, status: SpanStatus) {
        if !self.ended {
            self.status = status;
        }
    }

    fn record_exception(&mut self, exception_type: &str, error: &dyn std::error::Error) {
        if !self.ended {
            self.exceptions
                .push(RecordedException::capture(exception_type, error));
        }
    }

    fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;

        if self.status == SpanStatus::Unset {
            self.status = SpanStatus::Ok;
        }

        let finished = FinishedSpan {
            span_id: std::mem::take(&mut self.span_id),
            name: std::mem::take(&mut self.name),
            attributes: std::mem::take(&mut self.attributes),
            status: self.status.clone(),
            exceptions: std::mem::take(&mut self.exceptions),
            start_time: self.start_time,
            end_time: Utc::now(),
        };

        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(finished);
    }

    fn is_ended(&self) -> bool {
        self.ended
    }
}

/// Owns a span for the duration of one send and guarantees it is ended.
pub struct SpanGuard {
    span: Box<dyn TelemetrySpan>,
}

impl SpanGuard {
    /// Wrap a freshly created span.
    pub fn new(span: Box<dyn TelemetrySpan>) -> Self {
        Self { span }
    }

    /// Set one attribute.
    pub fn set_attribute(&mut self, key: &str, value: impl Into<AttributeValue>) {
        self.span.set_attribute(key, value.into());
    }

    /// Set several attributes.
    pub fn set_attributes(&mut self, attributes: Attributes) {
        self.span.set_attributes(attributes);
    }

    /// Set the span status.
    pub fn set_status(&mut self, status: SpanStatus) {
        self.span.set_status(status);
    }

    /// Record an error and mark the span as failed with its message.
    pub fn fail(&mut self, exception_type: &str, error: &dyn std::error::Error) {
        self.span.record_exception(exception_type, error);
        self.span.set_status(SpanStatus::error(error.to_string()));
    }

    /// Finalize the span.
    pub fn end(mut self) {
        self.span.end();
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if !self.span.is_ended() {
            self.span.set_status(SpanStatus::error(CANCELLED_MESSAGE));
            self.span.end();
        }
    }
}

impl fmt::Debug for SpanGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanGuard")
            .field("ended", &self.span.is_ended())
            .finish()
    }
}

/// Telemetry settings paired with the provider that creates spans.
#[derive(Clone)]
pub struct Telemetry {
    config: TelemetryConfig,
    provider: Arc<dyn TracerProvider>,
}

impl Telemetry {
    /// Pair a configuration with a provider.
    pub fn new(config: TelemetryConfig, provider: Arc<dyn TracerProvider>) -> Self {
        Self { config, provider }
    }

    /// The telemetry configuration.
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Start the span of one send. Disabled telemetry yields a no-op span.
    pub fn start_span(&self, attributes: Attributes) -> SpanGuard {
        let span = if self.config.enabled {
            self.provider.create_span(&self.config.span_name, attributes)
        } else {
            NoopTracerProvider.create_span(&self.config.span_name, attributes)
        };
        SpanGuard::new(span)
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(TelemetryConfig::default(), Arc::new(NoopTracerProvider))
    }
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("connection refused")
        }
    }

    impl std::error::Error for Inner {}

    #[derive(Debug)]
    struct Outer(Inner);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("request failed")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_telemetry_config_defaults() {
        let config = TelemetryConfig::default();
        assert!(config.enabled);
        assert_eq!(config.span_name, "sendgrid.send");
        assert!(!TelemetryConfig::disabled().enabled);
    }

    #[test]
    fn test_in_memory_span_lifecycle() {
        let provider = InMemoryTracerProvider::new();
        let mut span =
            provider.create_span("test", attributes([("http.url", "https://example.com")]));
        span.set_attribute("http.status_code", AttributeValue::from(202u16));

        assert!(provider.finished_spans().is_empty());
        span.end();

        let spans = provider.finished_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "test");
        assert_eq!(
            spans[0].attribute("http.url"),
            Some(&AttributeValue::String("https://example.com".to_string()))
        );
        assert_eq!(spans[0].attribute("http.status_code"), Some(&AttributeValue::Int(202)));
        assert_eq!(spans[0].status, SpanStatus::Ok);
        assert!(spans[0].end_time >= spans[0].start_time);
    }

    #[test]
    fn test_finished_span_is_immutable() {
        let provider = InMemoryTracerProvider::new();
        let mut span = provider.create_span("test", Attributes::new());
        span.end();

        span.set_attribute("late", AttributeValue::Bool(true));
        span.set_status(SpanStatus::error("late"));
        span.record_exception("Late", &Inner);
        span.end();

        let spans = provider.finished_spans();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].attribute("late").is_none());
        assert!(spans[0].status.is_ok());
        assert!(spans[0].exceptions.is_empty());
    }

    #[test]
    fn test_record_exception_captures_causes() {
        let provider = InMemoryTracerProvider::new();
        let mut guard = SpanGuard::new(provider.create_span("test", Attributes::new()));
        guard.fail("TransportError", &Outer(Inner));
        guard.end();

        let span = &provider.finished_spans()[0];
        assert_eq!(span.status.description(), Some("request failed"));
        assert_eq!(span.exceptions[0].exception_type, "TransportError");
        assert_eq!(span.exceptions[0].causes, vec!["connection refused".to_string()]);
    }

    #[test]
    fn test_dropped_guard_ends_span_as_cancelled() {
        let provider = InMemoryTracerProvider::new();
        {
            let mut guard = SpanGuard::new(provider.create_span("test", Attributes::new()));
            guard.set_attribute("email.num_recipients", 1usize);
        }

        let spans = provider.finished_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status.description(), Some(CANCELLED_MESSAGE));
    }

    #[test]
    fn test_ended_guard_does_not_cancel() {
        let provider = InMemoryTracerProvider::new();
        let guard = SpanGuard::new(provider.create_span("test", Attributes::new()));
        guard.end();

        let spans = provider.finished_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, SpanStatus::Ok);
    }

    #[test]
    fn test_disabled_telemetry_creates_no_spans() {
        let provider = InMemoryTracerProvider::new();
        let telemetry = Telemetry::new(TelemetryConfig::disabled(), Arc::new(provider.clone()));

        telemetry.start_span(Attributes::new()).end();

        assert!(provider.finished_spans().is_empty());
    }

    #[test]
    fn test_telemetry_uses_configured_span_name() {
        let provider = InMemoryTracerProvider::new();
        let telemetry = Telemetry::new(
            TelemetryConfig::new().with_span_name("custom.span.name"),
            Arc::new(provider.clone()),
        );

        telemetry.start_span(Attributes::new()).end();

        assert_eq!(provider.finished_spans()[0].name, "custom.span.name");
    }

    #[test]
    fn test_reset_clears_spans() {
        let provider = InMemoryTracerProvider::new();
        provider.create_span("a", Attributes::new()).end();
        provider.reset();
        assert!(provider.finished_spans().is_empty());
    }

    #[test]
    fn test_attribute_value_display() {
        assert_eq!(AttributeValue::from("x").to_string(), "x");
        assert_eq!(AttributeValue::from(3i64).to_string(), "3");
        let types = vec!["text/plain".to_string(), "text/html".to_string()];
        assert_eq!(AttributeValue::from(types).to_string(), "[text/plain, text/html]");
    }
}
