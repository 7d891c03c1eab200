//! OpenTelemetry span provider (enabled with the `opentelemetry` feature).

use opentelemetry::global::{self, BoxedSpan, BoxedTracer};
use opentelemetry::trace::{Span as _, Status, Tracer as _};
use opentelemetry::{Array, KeyValue, StringValue, Value};
use std::fmt;

use super::spans::{AttributeValue, Attributes, SpanStatus, TelemetrySpan, TracerProvider};

/// Instrumentation scope used when none is given.
pub const INSTRUMENTATION_NAME: &str = "integrations-sendgrid";

/// Provider backed by an OpenTelemetry tracer.
pub struct OpenTelemetryProvider {
    tracer: BoxedTracer,
}

impl OpenTelemetryProvider {
    /// Use the globally registered OpenTelemetry tracer provider.
    pub fn global() -> Self {
        Self::with_tracer(global::tracer(INSTRUMENTATION_NAME))
    }

    /// Use an explicit tracer.
    pub fn with_tracer(tracer: BoxedTracer) -> Self {
        Self { tracer }
    }
}

impl fmt::Debug for OpenTelemetryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenTelemetryProvider").finish_non_exhaustive()
    }
}

impl TracerProvider for OpenTelemetryProvider {
    fn create_span(&self, name: &str, attributes: Attributes) -> Box<dyn TelemetrySpan> {
        let mut span = self.tracer.start(name.to_string());
        for (key, value) in attributes {
            span.set_attribute(key_value(key, value));
        }
        Box::new(OtelSpan { span, ended: false })
    }
}

struct OtelSpan {
    span: BoxedSpan,
    ended: bool,
}

impl TelemetrySpan for OtelSpan {
    fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        if !self.ended {
            self.span.set_attribute(key_value(key.to_string(), value));
        }
    }

    fn set_status(&mut self, status: SpanStatus) {
        if self.ended {
            return;
        }
        let status = match status {
            SpanStatus::Unset => Status::Unset,
            SpanStatus::Ok => Status::Ok,
            SpanStatus::Error { message } => Status::error(message),
        };
        self.span.set_status(status);
    }

    fn record_exception(&mut self, exception_type: &str, error: &dyn std::error::Error) {
        if !self.ended {
            self.span.add_event(
                "exception",
                vec![
                    KeyValue::new("exception.type", exception_type.to_string()),
                    KeyValue::new("exception.message", error.to_string()),
                ],
            );
        }
    }

    fn end(&mut self) {
        if !self.ended {
            self.ended = true;
            self.span.end();
        }
    }

    fn is_ended(&self) -> bool {
        self.ended
    }
}

fn key_value(key: String, value: AttributeValue) -> KeyValue {
    let value = match value {
        AttributeValue::String(s) => Value::from(s),
        AttributeValue::Int(i) => Value::I64(i),
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::Float(f) => Value::F64(f),
        AttributeValue::StringArray(items) => Value::Array(Array::String(
            items.into_iter().map(StringValue::from).collect(),
        )),
    };
    KeyValue::new(key, value)
}
