//! SendGrid client and the instrumented send operation.

use async_trait::async_trait;
use http::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT,
};
use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;

use crate::config::SendgridConfig;
use crate::error::{SendgridError, SendgridResult, SESSION_CLOSED_MESSAGE};
use crate::http::{ClientSession, ConnectionPool, SendgridResponse};
use crate::mail::MailPayload;
use crate::observability::{
    attributes, AttributeValue, NoopTracerProvider, SpanStatus, Telemetry, TracerProvider,
};

/// Header naming the subuser a request is made on behalf of.
pub const ON_BEHALF_OF: &str = "on-behalf-of";

/// Operations exposed by a SendGrid client.
#[async_trait]
pub trait SendgridApi: Send + Sync {
    /// The API key.
    fn api_key(&self) -> &SecretString;

    /// The mail-send endpoint.
    fn endpoint(&self) -> &str;

    /// Headers sent with every request.
    fn headers(&self) -> &HeaderMap;

    /// The session requests go through.
    fn session(&self) -> &ClientSession;

    /// The pool the session was created from.
    fn pool(&self) -> &ConnectionPool;

    /// Send a message.
    ///
    /// HTTP error statuses are returned as `Ok`; inspect
    /// [`SendgridResponse::is_success`].
    async fn send(&self, message: &dyn MailPayload) -> SendgridResult<SendgridResponse>;
}

/// Async SendGrid v3 mail-send client.
///
/// # Example
///
/// ```no_run
/// use integrations_sendgrid::{Mail, SendgridApi, SendgridClient, SendgridConfig};
///
/// # async fn run() -> integrations_sendgrid::Result<()> {
/// let client = SendgridClient::new(SendgridConfig::builder().api_key("SG.key").build()?)?;
///
/// let mail = Mail::builder()
///     .from("sender@example.com")
///     .to("recipient@example.com")
///     .subject("Hello")
///     .text("Hi there")
///     .build()?;
///
/// let response = client.send(&mail).await?;
/// println!("{}", response.status_code());
/// # Ok(())
/// # }
/// ```
pub struct SendgridClient {
    api_key: SecretString,
    endpoint: String,
    headers: HeaderMap,
    pool: Arc<ConnectionPool>,
    session: Arc<ClientSession>,
    telemetry: Telemetry,
}

impl SendgridClient {
    /// Create a client with a no-op tracer provider.
    pub fn new(config: SendgridConfig) -> SendgridResult<Self> {
        Self::builder(config).build()
    }

    /// Create a client that reports spans to `provider`.
    pub fn with_provider(
        config: SendgridConfig,
        provider: Arc<dyn TracerProvider>,
    ) -> SendgridResult<Self> {
        Self::builder(config).tracer_provider(provider).build()
    }

    /// Create a client from `SENDGRID_*` environment variables.
    pub fn from_env() -> SendgridResult<Self> {
        Self::new(SendgridConfig::from_env()?)
    }

    /// Start building a client.
    pub fn builder(config: SendgridConfig) -> SendgridClientBuilder {
        SendgridClientBuilder::new(config)
    }

    /// Telemetry settings and provider.
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Close the underlying session. Later sends fail with
    /// [`SendgridError::SessionClosed`].
    pub fn close(&self) -> bool {
        self.session.close()
    }
}

fn encode(message: &dyn MailPayload) -> SendgridResult<Vec<u8>> {
    Ok(serde_json::to_vec(&message.to_json()?)?)
}

#[async_trait]
impl SendgridApi for SendgridClient {
    fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn session(&self) -> &ClientSession {
        &self.session
    }

    fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    async fn send(&self, message: &dyn MailPayload) -> SendgridResult<SendgridResponse> {
        let mut span = self.telemetry.start_span(attributes([
            ("http.url", AttributeValue::from(self.endpoint.as_str())),
            ("email.has_attachments", message.has_attachments().into()),
            ("email.num_recipients", message.num_recipients().into()),
            ("email.content_types", message.content_types().into()),
        ]));

        if self.session.is_closed() {
            let error = SendgridError::session_closed();
            span.set_attribute("error.message", SESSION_CLOSED_MESSAGE);
            span.set_attribute("error.type", error.error_type());
            span.set_status(SpanStatus::error(SESSION_CLOSED_MESSAGE));
            span.end();
            return Err(error);
        }

        tracing::debug!(endpoint = %self.endpoint, "sending mail");

        let body = match encode(message) {
            Ok(body) => body,
            Err(e) => {
                span.fail(e.error_type(), &e);
                span.end();
                return Err(e);
            }
        };
        span.set_attribute("http.message_size", body.len());

        match self.session.post_body(&self.endpoint, body).await {
            Ok(response) => {
                let code = response.status_code();
                span.set_attribute("http.status_code", code);
                span.set_attribute("http.url", response.url());
                span.set_attribute("http.method", response.method());
                span.set_attribute("http.content_length", response.content_length());

                if code >= 400 {
                    tracing::warn!(status = code, "mail send rejected");
                    span.set_status(SpanStatus::error(format!(
                        "Request failed with status code {}",
                        code
                    )));
                } else {
                    span.set_status(SpanStatus::Ok);
                }
                span.end();
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(error = %e, "mail send failed");
                span.fail(e.error_type(), &e);
                span.end();
                Err(e)
            }
        }
    }
}

impl fmt::Display for SendgridClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SendGrid API Client\n  • Endpoint: {}\n", self.endpoint)
    }
}

impl fmt::Debug for SendgridClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SendgridClient(endpoint={})", self.endpoint)
    }
}

/// Builder for [`SendgridClient`].
pub struct SendgridClientBuilder {
    config: SendgridConfig,
    pool: Option<Arc<ConnectionPool>>,
    provider: Arc<dyn TracerProvider>,
}

impl SendgridClientBuilder {
    fn new(config: SendgridConfig) -> Self {
        Self {
            config,
            pool: None,
            provider: Arc::new(NoopTracerProvider),
        }
    }

    /// Share an existing pool instead of one built from the configured limits.
    pub fn pool(mut self, pool: Arc<ConnectionPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Report spans to `provider`.
    pub fn tracer_provider(mut self, provider: Arc<dyn TracerProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Build the client and open its session.
    ///
    /// # Errors
    ///
    /// Returns [`SendgridError::Validation`] if a header value is not valid
    /// and [`SendgridError::Configuration`] if the HTTP client cannot be
    /// created.
    pub fn build(self) -> SendgridResult<SendgridClient> {
        let headers = request_headers(&self.config)?;
        let pool = self
            .pool
            .unwrap_or_else(|| Arc::new(ConnectionPool::new(self.config.pool)));
        let session = Arc::new(pool.create_client(&headers)?);

        tracing::debug!(endpoint = %self.config.endpoint, pool = %pool, "created sendgrid client");

        Ok(SendgridClient {
            api_key: self.config.api_key,
            endpoint: self.config.endpoint,
            headers,
            pool,
            session,
            telemetry: Telemetry::new(self.config.telemetry, self.provider),
        })
    }
}

fn request_headers(config: &SendgridConfig) -> SendgridResult<HeaderMap> {
    let mut headers = HeaderMap::new();

    let mut authorization = header_value(&config.bearer_token(), "api_key")?;
    authorization.set_sensitive(true);
    headers.insert(AUTHORIZATION, authorization);
    headers.insert(USER_AGENT, header_value(&config.user_agent, "user_agent")?);
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(subuser) = &config.impersonate_subuser {
        headers.insert(
            HeaderName::from_static(ON_BEHALF_OF),
            header_value(subuser, "impersonate_subuser")?,
        );
    }

    Ok(headers)
}

fn header_value(value: &str, field: &str) -> SendgridResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        SendgridError::validation(format!("{} is not a valid header value", field), field)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::MockMailPayload;
    use crate::observability::{InMemoryTracerProvider, TelemetryConfig};
    use secrecy::ExposeSecret;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: &str) -> SendgridConfig {
        SendgridConfig::builder()
            .api_key("SG.test-key")
            .endpoint(endpoint)
            .build()
            .unwrap()
    }

    fn client_with_memory(endpoint: &str) -> (SendgridClient, Arc<InMemoryTracerProvider>) {
        let provider = Arc::new(InMemoryTracerProvider::new());
        let client = SendgridClient::with_provider(config(endpoint), provider.clone()).unwrap();
        (client, provider)
    }

    #[test]
    fn test_request_headers() {
        let mut config = config("https://api.sendgrid.com/v3/mail/send");
        config.impersonate_subuser = Some("John Smith".to_string());

        let headers = request_headers(&config).unwrap();

        assert_eq!(headers[AUTHORIZATION], "Bearer SG.test-key");
        assert!(headers[AUTHORIZATION].is_sensitive());
        assert_eq!(headers[ACCEPT], "*/*");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[ON_BEHALF_OF], "John Smith");
        assert!(headers[USER_AGENT]
            .to_str()
            .unwrap()
            .starts_with("integrations-sendgrid/"));
    }

    #[test]
    fn test_invalid_header_value_is_rejected() {
        let mut config = config("https://api.sendgrid.com/v3/mail/send");
        config.impersonate_subuser = Some("bad\nname".to_string());

        let err = request_headers(&config).unwrap_err();
        assert!(matches!(err, SendgridError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_display_and_debug_do_not_leak_key() {
        let client = SendgridClient::new(config("https://api.sendgrid.com/v3/mail/send")).unwrap();

        assert_eq!(
            client.to_string(),
            "SendGrid API Client\n  • Endpoint: https://api.sendgrid.com/v3/mail/send\n"
        );
        assert_eq!(
            format!("{:?}", client),
            "SendgridClient(endpoint=https://api.sendgrid.com/v3/mail/send)"
        );
        assert!(!format!("{:?}", client).contains("SG.test-key"));
    }

    #[tokio::test]
    async fn test_session_uses_configured_limits() {
        let client = SendgridClient::new(config("https://api.sendgrid.com/v3/mail/send")).unwrap();

        assert_eq!(client.session().limits(), client.pool().limits());
        assert!(!client.session().is_closed());
        assert_eq!(client.api_key().expose_secret(), "SG.test-key");
    }

    #[tokio::test]
    async fn test_send_tags_span() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .and(header("authorization", "Bearer SG.test-key"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = format!("{}/v3/mail/send", server.uri());
        let (client, provider) = client_with_memory(&endpoint);
        let mail = json!({
            "personalizations": [{"to": [{"email": "a@example.com"}, {"email": "b@example.com"}]}],
            "from": {"email": "sender@example.com"},
            "content": [{"type": "text/plain", "value": "hi"}]
        });

        let response = client.send(&mail).await.unwrap();
        assert_eq!(response.status_code(), 202);

        let spans = provider.finished_spans();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.name, "sendgrid.send");
        assert_eq!(span.attribute("http.status_code"), Some(&AttributeValue::Int(202)));
        assert_eq!(span.attribute("http.method"), Some(&AttributeValue::from("POST")));
        assert_eq!(span.attribute("email.num_recipients"), Some(&AttributeValue::Int(2)));
        assert_eq!(
            span.attribute("email.has_attachments"),
            Some(&AttributeValue::Bool(false))
        );
        assert_eq!(span.attribute("http.content_length"), Some(&AttributeValue::Int(0)));
        assert!(span.status.is_ok());
    }

    #[tokio::test]
    async fn test_send_marks_http_errors_on_span() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"errors":[]}"#))
            .mount(&server)
            .await;

        let (client, provider) = client_with_memory(&format!("{}/v3/mail/send", server.uri()));

        let response = client.send(&json!({})).await.unwrap();
        assert_eq!(response.status_code(), 401);
        assert_eq!(response.body(), br#"{"errors":[]}"#);

        let span = &provider.finished_spans()[0];
        assert_eq!(
            span.status.description(),
            Some("Request failed with status code 401")
        );
        assert_eq!(span.attribute("http.content_length"), Some(&AttributeValue::Int(13)));
    }

    #[tokio::test]
    async fn test_send_on_closed_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .expect(0)
            .mount(&server)
            .await;

        let (client, provider) = client_with_memory(&format!("{}/v3/mail/send", server.uri()));
        assert!(client.close());

        let err = client.send(&json!({})).await.unwrap_err();
        assert!(err.is_session_closed());
        assert_eq!(err.to_string(), SESSION_CLOSED_MESSAGE);

        let spans = provider.finished_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(
            spans[0].attribute("error.type"),
            Some(&AttributeValue::from("SessionClosedException"))
        );
        assert_eq!(
            spans[0].attribute("error.message"),
            Some(&AttributeValue::from(SESSION_CLOSED_MESSAGE))
        );
        assert_eq!(spans[0].status.description(), Some(SESSION_CLOSED_MESSAGE));
    }

    #[tokio::test]
    async fn test_serialization_failure_is_recorded() {
        let (client, provider) = client_with_memory("http://127.0.0.1:1/v3/mail/send");

        let mut payload = MockMailPayload::new();
        payload.expect_has_attachments().return_const(true);
        payload.expect_num_recipients().return_const(1usize);
        payload.expect_content_types().returning(Vec::new);
        payload.expect_to_json().times(1).returning(|| {
            Err(SendgridError::Serialization {
                message: "unserializable".to_string(),
                source: None,
            })
        });

        let err = client.send(&payload).await.unwrap_err();
        assert!(matches!(err, SendgridError::Serialization { .. }));

        let span = &provider.finished_spans()[0];
        assert_eq!(span.exceptions.len(), 1);
        assert_eq!(span.exceptions[0].exception_type, "SerializationError");
        assert_eq!(
            span.attribute("email.has_attachments"),
            Some(&AttributeValue::Bool(true))
        );
        assert!(span.attribute("http.message_size").is_none());
    }

    #[tokio::test]
    async fn test_disabled_telemetry_emits_no_spans() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let provider = Arc::new(InMemoryTracerProvider::new());
        let config = SendgridConfig::builder()
            .api_key("SG.test-key")
            .endpoint(format!("{}/v3/mail/send", server.uri()))
            .telemetry(TelemetryConfig::disabled())
            .build()
            .unwrap();
        let client = SendgridClient::with_provider(config, provider.clone()).unwrap();
        assert!(!client.telemetry().config().enabled);

        client.send(&json!({})).await.unwrap();
        assert!(provider.finished_spans().is_empty());
    }
}
