use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, warn};

use super::credentials::{CredentialKey, CredentialStore};

/// Session ID lifetime in hours.
const SESSION_LIFETIME_HOURS: i64 = 24;

/// Buffer time before expiry to trigger renewal (60 minutes)
const SESSION_RENEWAL_BUFFER_MINUTES: i64 = 60;

const SESSION_ID_RANDOM_LEN: usize = 16;

/// Hands out the `X-Session-ID` value for each outbound request.
///
/// The ID and its issue time are kept in the credential store so they
/// survive restarts when the store is persistent.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    lifetime: Duration,
    renewal_buffer: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            lifetime: Duration::hours(SESSION_LIFETIME_HOURS),
            renewal_buffer: Duration::minutes(SESSION_RENEWAL_BUFFER_MINUTES),
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration, renewal_buffer: Duration) -> Self {
        self.lifetime = lifetime;
        self.renewal_buffer = renewal_buffer;
        self
    }

    /// Session ID to attach to the request being built.
    ///
    /// Creates a session if none exists or the stored one has expired. If the
    /// session is inside the renewal window a replacement is stored for later
    /// requests, while this request still gets the current (valid) ID.
    pub fn session_id_for_request(&self) -> Result<String> {
        let now = Utc::now();
        let current = self.store.get(CredentialKey::SessionId)?;
        let issued_at = self.issued_at()?;

        match (current, issued_at) {
            (Some(id), Some(issued)) if now < issued + self.lifetime => {
                if now >= issued + self.lifetime - self.renewal_buffer {
                    if let Err(e) = self.create(now) {
                        warn!(error = %e, "Failed to renew session ID");
                    } else {
                        debug!("Session ID renewed ahead of expiry");
                    }
                }
                Ok(id)
            }
            _ => self.create(now),
        }
    }

    /// Time the current session was issued, if one exists and parses
    pub fn issued_at(&self) -> Result<Option<DateTime<Utc>>> {
        let raw = match self.store.get(CredentialKey::SessionIssuedAt)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(ts) => Ok(Some(ts.with_timezone(&Utc))),
            Err(e) => {
                debug!(error = %e, "Ignoring unparseable session timestamp");
                Ok(None)
            }
        }
    }

    /// Remove the session ID (explicit logout only)
    pub fn clear(&self) -> Result<()> {
        self.store.remove(CredentialKey::SessionId)?;
        self.store.remove(CredentialKey::SessionIssuedAt)?;
        Ok(())
    }

    fn create(&self, now: DateTime<Utc>) -> Result<String> {
        let id = generate_session_id(now);
        self.store
            .set(CredentialKey::SessionId, &id)
            .context("Failed to store session ID")?;
        self.store
            .set(CredentialKey::SessionIssuedAt, &now.to_rfc3339())
            .context("Failed to store session timestamp")?;
        Ok(id)
    }
}

fn generate_session_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("sess_{}_{}", now.timestamp_millis(), suffix)
}
