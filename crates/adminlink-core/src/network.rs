//! Connectivity tracking shared with the host UI.
//!
//! The client works without an observer. When one is registered it decides
//! retry eligibility for failures without a response, and every unrecovered
//! error is annotated with its classification.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use serde::Serialize;
use tracing::{info, warn};

use crate::api::transport::FailureKind;
use crate::api::ApiError;

/// Consecutive connect failures before the monitor reports offline.
const OFFLINE_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum Connectivity {
    Offline,
    Timeout,
    ServerUnreachable,
    ServerError,
    ClientError,
}

pub trait NetworkStatusObserver: Send + Sync {
    fn is_online(&self) -> bool;

    fn classify_error(&self, error: &ApiError) -> Connectivity;

    /// Whether a failure without an HTTP response should be retried
    fn should_retry(&self, error: &ApiError) -> bool;

    fn record_success(&self) {}

    fn record_failure(&self, _error: &ApiError) {}
}

/// Observer that infers connectivity from request outcomes.
#[derive(Debug)]
pub struct NetworkMonitor {
    online: AtomicBool,
    consecutive_failures: AtomicU32,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkMonitor {
    pub fn new() -> Self {
        Self {
            online: AtomicBool::new(true),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}

impl NetworkStatusObserver for NetworkMonitor {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    fn classify_error(&self, error: &ApiError) -> Connectivity {
        if let Some(failure) = error.transport_error() {
            if !self.is_online() {
                return Connectivity::Offline;
            }
            return match failure.kind {
                FailureKind::Timeout => Connectivity::Timeout,
                _ => Connectivity::ServerUnreachable,
            };
        }
        match error.status() {
            Some(status) if status >= 500 => Connectivity::ServerError,
            _ => Connectivity::ClientError,
        }
    }

    fn should_retry(&self, error: &ApiError) -> bool {
        match error.transport_error() {
            Some(failure) => failure.kind != FailureKind::Build,
            None => false,
        }
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        if !self.online.swap(true, Ordering::Relaxed) {
            info!("Backend reachable again");
        }
    }

    fn record_failure(&self, error: &ApiError) {
        let connect_failure = error
            .transport_error()
            .map(|f| f.kind == FailureKind::Connect)
            .unwrap_or(false);
        if !connect_failure {
            return;
        }
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= OFFLINE_THRESHOLD && self.online.swap(false, Ordering::Relaxed) {
            warn!(failures, "Backend unreachable, marking offline");
        }
    }
}
