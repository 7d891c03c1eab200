//! HTTP response handling for the SendGrid API.

use http::StatusCode;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use crate::error::{SendgridError, SendgridResult};

/// A response from the SendGrid API.
///
/// The body is read eagerly so the connection can return to the pool.
#[derive(Debug, Clone)]
pub struct SendgridResponse {
    /// HTTP status code
    status: StatusCode,

    /// Final URL of the request
    url: String,

    /// Request method
    method: String,

    /// Response headers, keyed by lowercase name
    headers: HashMap<String, String>,

    /// Response body
    body: Vec<u8>,
}

impl SendgridResponse {
    /// Create a new response.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use integrations_sendgrid::http::SendgridResponse;
    /// use http::StatusCode;
    /// use std::collections::HashMap;
    ///
    /// let response = SendgridResponse::new(StatusCode::ACCEPTED, HashMap::new(), Vec::new());
    /// assert!(response.is_success());
    /// assert_eq!(response.content_length(), 0);
    /// ```
    pub fn new(status: StatusCode, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_lowercase(), value))
            .collect();

        Self {
            status,
            url: String::new(),
            method: String::new(),
            headers,
            body,
        }
    }

    /// Attach the request method and URL this response answers.
    pub fn with_request(mut self, method: impl Into<String>, url: impl Into<String>) -> Self {
        self.method = method.into();
        self.url = url.into();
        self
    }

    /// Create a response from a `reqwest` response, reading the full body.
    pub(crate) async fn from_reqwest(
        method: &Method,
        response: reqwest::Response,
    ) -> SendgridResult<Self> {
        let status = response.status();
        let url = response.url().to_string();

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value_str) = value.to_str() {
                headers.insert(name.as_str().to_lowercase(), value_str.to_string());
            }
        }

        let body = response.bytes().await?.to_vec();

        Ok(Self::new(status, headers, body).with_request(method.as_str(), url))
    }

    /// HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// HTTP status code as a number.
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Final URL of the request.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Method of the request.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Get a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|s| s.as_str())
    }

    /// All response headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Raw response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Length of the response body in bytes.
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Response body as UTF-8 text.
    pub fn text(&self) -> SendgridResult<&str> {
        std::str::from_utf8(&self.body).map_err(|e| SendgridError::Serialization {
            message: format!("Response body is not valid UTF-8: {}", e),
            source: None,
        })
    }

    /// Parse the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> SendgridResult<T> {
        serde_json::from_slice(&self.body).map_err(Into::into)
    }

    /// SendGrid message id, present on accepted sends.
    pub fn message_id(&self) -> Option<&str> {
        self.header("x-message-id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_response_accessors() {
        let mut headers = HashMap::new();
        headers.insert("X-Message-Id".to_string(), "abc123".to_string());

        let response = SendgridResponse::new(StatusCode::ACCEPTED, headers, b"".to_vec())
            .with_request("POST", "https://api.sendgrid.com/v3/mail/send");

        assert_eq!(response.status_code(), 202);
        assert!(response.is_success());
        assert_eq!(response.method(), "POST");
        assert_eq!(response.url(), "https://api.sendgrid.com/v3/mail/send");
        assert_eq!(response.message_id(), Some("abc123"));
        assert_eq!(response.header("x-message-id"), Some("abc123"));
        assert_eq!(response.content_length(), 0);
    }

    #[test]
    fn test_response_json_error_body() {
        let body = br#"{"errors":[{"message":"The from address does not match a verified Sender Identity."}]}"#;
        let response = SendgridResponse::new(StatusCode::FORBIDDEN, HashMap::new(), body.to_vec());

        let parsed: Value = response.json().unwrap();
        assert!(!response.is_success());
        assert_eq!(
            parsed["errors"][0]["message"],
            "The from address does not match a verified Sender Identity."
        );
        assert_eq!(response.content_length(), body.len());
    }

    #[test]
    fn test_response_invalid_utf8() {
        let response = SendgridResponse::new(StatusCode::OK, HashMap::new(), vec![0xff, 0xfe]);
        assert!(response.text().is_err());
    }
}
