//! Authenticated HTTP client for the admin backend.
//!
//! This module provides the `HttpClient` used by every admin page. Each call
//! gets a session ID header and a bearer token (auth token, else admin token),
//! network-level failures are retried with exponential backoff, and 401/403
//! answers clear the rejected credential before surfacing as errors.

pub mod client;
pub mod error;
pub mod request;
pub mod response;
pub mod transport;

pub use client::{HttpClient, HttpClientBuilder, TimeoutClass, SESSION_HEADER};
pub use error::{ApiError, ErrorResponse};
pub use request::{MultipartForm, RequestBody, RequestOptions};
pub use response::{ApiResponse, ResponseCache};
pub use reqwest::Method;
pub use transport::{FailureKind, OutboundRequest, RawResponse, ReqwestTransport, Transport, TransportError};
