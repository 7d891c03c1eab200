//! Live client sessions.
//!
//! A [`ClientSession`] owns a configured `reqwest` client plus a semaphore of
//! connection slots sized to the pool's `max_connections`. Requests beyond
//! the ceiling wait for a free slot; idle connections are recycled by
//! `reqwest` according to the keep-alive limits.
//!
//! Closing a session drops the underlying client and closes the slot
//! semaphore, so queued and future requests fail with
//! [`SendgridError::SessionClosed`] without touching the network.

use http::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method};
use std::sync::{PoisonError, RwLock};
use tokio::sync::Semaphore;

use super::pool::PoolConfig;
use super::response::SendgridResponse;
use crate::error::{SendgridError, SendgridResult};

/// A live HTTP transport created by a [`ConnectionPool`](super::ConnectionPool).
#[derive(Debug)]
pub struct ClientSession {
    /// `None` once the session has been closed.
    client: RwLock<Option<Client>>,

    /// Headers sent with every request.
    headers: HeaderMap,

    /// Limits the session was built with.
    limits: PoolConfig,

    /// One permit per allowed concurrent connection.
    slots: Semaphore,
}

impl ClientSession {
    pub(crate) fn new(client: Client, headers: HeaderMap, limits: PoolConfig) -> Self {
        let permits = limits.max_connections().min(Semaphore::MAX_PERMITS);

        Self {
            client: RwLock::new(Some(client)),
            headers,
            limits,
            slots: Semaphore::new(permits),
        }
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Close the session.
    ///
    /// Idle connections are released once in-flight requests complete.
    /// Requests still waiting for a connection slot fail with
    /// [`SendgridError::SessionClosed`].
    ///
    /// # Returns
    ///
    /// `true` if this call closed the session, `false` if it was already
    /// closed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use http::header::HeaderMap;
    /// use integrations_sendgrid::http::ConnectionPool;
    ///
    /// # fn main() -> integrations_sendgrid::Result<()> {
    /// let session = ConnectionPool::default().create_client(&HeaderMap::new())?;
    ///
    /// assert!(session.close());
    /// assert!(!session.close());
    /// assert_eq!(session.available_slots(), 0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn close(&self) -> bool {
        let previous = self
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.slots.close();

        if previous.is_some() {
            tracing::debug!("client session closed");
        }
        previous.is_some()
    }

    /// Headers sent with every request, defaults included.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Limits the session was created with.
    pub fn limits(&self) -> &PoolConfig {
        &self.limits
    }

    /// Number of connection slots currently free. Always zero once closed.
    pub fn available_slots(&self) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.slots.available_permits()
    }

    /// POST a JSON value to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SendgridError::SessionClosed`] if the session is closed,
    /// [`SendgridError::Serialization`] if `body` cannot be encoded and
    /// [`SendgridError::Transport`] on network failure. HTTP error statuses
    /// are returned as `Ok`.
    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> SendgridResult<SendgridResponse> {
        let bytes = serde_json::to_vec(body)?;
        self.post_body(url, bytes).await
    }

    /// POST an already-encoded JSON body to `url`.
    ///
    /// Waits for a free connection slot when `max_connections` requests are
    /// already in flight. `Content-Type: application/json` is added unless
    /// the session headers set one.
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute request URL
    /// * `body` - Encoded JSON body
    ///
    /// # Returns
    ///
    /// The response with its body read, whatever its status.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use http::header::HeaderMap;
    /// use integrations_sendgrid::http::ConnectionPool;
    ///
    /// # async fn run() -> integrations_sendgrid::Result<()> {
    /// let session = ConnectionPool::default().create_client(&HeaderMap::new())?;
    /// let response = session
    ///     .post_body("https://api.sendgrid.com/v3/mail/send", br#"{}"#.to_vec())
    ///     .await?;
    /// println!("{}", response.status_code());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn post_body(&self, url: &str, body: Vec<u8>) -> SendgridResult<SendgridResponse> {
        self.execute(Method::POST, url, Some(body)).await
    }

    /// Issue a GET request to `url`.
    ///
    /// Shares the connection slots with POSTs on the same session.
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute request URL
    ///
    /// # Returns
    ///
    /// The response with its body read, whatever its status.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use http::header::HeaderMap;
    /// use integrations_sendgrid::http::ConnectionPool;
    ///
    /// # async fn run() -> integrations_sendgrid::Result<()> {
    /// let session = ConnectionPool::default().create_client(&HeaderMap::new())?;
    /// let response = session.get("https://api.sendgrid.com/v3/scopes").await?;
    /// assert!(response.status_code() > 0);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get(&self, url: &str) -> SendgridResult<SendgridResponse> {
        self.execute(Method::GET, url, None).await
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> SendgridResult<SendgridResponse> {
        let client = self.client()?;

        // Held until the body has been read so the connection is not reused early.
        let _slot = self
            .slots
            .acquire()
            .await
            .map_err(|_| SendgridError::session_closed())?;

        tracing::debug!(method = %method, url, "dispatching request");

        let mut request = client.request(method.clone(), url);
        if let Some(body) = body {
            if !self.headers.contains_key(CONTENT_TYPE) {
                request = request.header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
            }
            request = request.body(body);
        }

        let response = request.send().await?;
        SendgridResponse::from_reqwest(&method, response).await
    }

    fn client(&self) -> SendgridResult<Client> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(SendgridError::session_closed)
    }
}
