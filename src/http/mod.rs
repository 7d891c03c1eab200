//! HTTP module for SendGrid API communication.
//!
//! - **Connection Pooling**: [`ConnectionPool`] holds connection limits and
//!   manufactures sessions
//! - **Sessions**: [`ClientSession`] is the live transport, closable and
//!   bounded by `max_connections`
//! - **Responses**: [`SendgridResponse`] with the body read eagerly
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ ConnectionPool  │  - PoolConfig limits
//! │                 │  - Default headers
//! └────────┬────────┘
//!          │ create_client(headers)
//!          ▼
//! ┌─────────────────┐
//! │  ClientSession  │  - Connection slots
//! │                 │  - Closed state
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   reqwest       │  - Keep-alive and idle expiry
//! └─────────────────┘
//! ```

mod pool;
mod response;
mod session;

pub use pool::{ConnectionPool, PoolConfig};
pub use response::SendgridResponse;
pub use session::ClientSession;
