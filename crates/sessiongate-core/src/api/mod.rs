//! Request gateway module.
//!
//! This module provides the `RequestGateway` that every outbound call goes
//! through, the `Transport` seam it dispatches on (with a reqwest-backed
//! implementation), and the `ApiError` taxonomy callers match on.
//!
//! The backend wraps every payload in a `{code, msg, ...}` envelope; the
//! application `code` is what decides success, not the HTTP status.

pub mod client;
pub mod error;
pub mod query;
pub mod transport;

pub use client::{GatewaySettings, RequestGateway, RequestSpec, SessionExpiryHandler};
pub use error::ApiError;
pub use transport::{ReqwestTransport, Transport, TransportFailure, TransportRequest, TransportResponse};
