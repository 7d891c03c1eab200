//! Bridge from [`TelemetrySpan`] to the `tracing` ecosystem.
//!
//! Spans are emitted as `tracing` spans with OpenTelemetry-style field names,
//! so a `tracing-opentelemetry` layer (or any subscriber) can export them.

use tracing::field::Empty;
use tracing::Span;

use super::spans::{AttributeValue, Attributes, SpanStatus, TelemetrySpan, TracerProvider};

/// Provider that creates `tracing` spans.
///
/// `tracing` span names are static, so every span is named `sendgrid.send`;
/// the configured name is recorded in the `otel.name` field. Attributes
/// without a matching field are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSpanProvider;

impl TracerProvider for TracingSpanProvider {
    fn create_span(&self, name: &str, attributes: Attributes) -> Box<dyn TelemetrySpan> {
        let span = tracing::info_span!(
            "sendgrid.send",
            otel.name = %name,
            otel.kind = "client",
            otel.status_code = Empty,
            otel.status_description = Empty,
            http.url = Empty,
            http.method = Empty,
            http.status_code = Empty,
            http.content_length = Empty,
            http.message_size = Empty,
            email.has_attachments = Empty,
            email.num_recipients = Empty,
            email.content_types = Empty,
            error.message = Empty,
        );

        let mut bridged = TracingSpan { span, ended: false };
        bridged.set_attributes(attributes);
        Box::new(bridged)
    }
}

struct TracingSpan {
    span: Span,
    ended: bool,
}

impl TelemetrySpan for TracingSpan {
    fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        match value {
            AttributeValue::String(s) => self.span.record(key, s.as_str()),
            AttributeValue::Int(i) => self.span.record(key, i),
            AttributeValue::Bool(b) => self.span.record(key, b),
            AttributeValue::Float(f) => self.span.record(key, f),
            AttributeValue::StringArray(items) => {
                self.span.record(key, tracing::field::display(items.join(",")))
            }
        };
    }

    fn set_status(&mut self, status: SpanStatus) {
        match status {
            SpanStatus::Unset => {}
            SpanStatus::Ok => {
                self.span.record("otel.status_code", "OK");
            }
            SpanStatus::Error { message } => {
                self.span.record("otel.status_code", "ERROR");
                self.span.record("otel.status_description", message.as_str());
            }
        }
    }

    fn record_exception(&mut self, exception_type: &str, error: &dyn std::error::Error) {
        self.span.in_scope(|| {
            tracing::warn!(
                exception_type,
                exception_message = %error,
                "exception recorded on span"
            );
        });
    }

    fn end(&mut self) {
        if !self.ended {
            self.ended = true;
            // Dropping the last handle closes the span.
            self.span = Span::none();
        }
    }

    fn is_ended(&self) -> bool {
        self.ended
    }
}
