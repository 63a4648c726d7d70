//! adminlink core library.
//!
//! An authenticated HTTP client for the admin console backend: base URL
//! resolution, session and bearer-token headers, 304 handling, retry with
//! exponential backoff on transient network failures, and centralized
//! 401/403 handling. The [`admin::AdminApi`] facade sits on top and exposes
//! one method per admin resource operation.

pub mod admin;
pub mod api;
pub mod auth;
pub mod config;
pub mod events;
pub mod navigation;
pub mod network;

#[cfg(test)]
pub(crate) mod test_support;

pub use admin::{AdminApi, AdminResource, ConfigSection};
pub use api::{ApiError, ApiResponse, HttpClient, HttpClientBuilder, RequestBody, RequestOptions};
pub use auth::{CredentialKey, CredentialStore, MemoryCredentialStore, SessionManager};
pub use config::ClientConfig;
pub use events::{AuthEvent, AuthEvents};
pub use navigation::{AdminRedirectPolicy, AuthFailureContext, AuthFailureHandler, NavigationIntent};
pub use network::{Connectivity, NetworkMonitor, NetworkStatusObserver};
