use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "adminlink";

/// Keys held by a credential store. Each value is a flat string or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    SessionId,
    SessionIssuedAt,
    AuthToken,
    AdminToken,
}

impl CredentialKey {
    pub const ALL: [CredentialKey; 4] = [
        CredentialKey::SessionId,
        CredentialKey::SessionIssuedAt,
        CredentialKey::AuthToken,
        CredentialKey::AdminToken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKey::SessionId => "session_id",
            CredentialKey::SessionIssuedAt => "session_issued_at",
            CredentialKey::AuthToken => "auth_token",
            CredentialKey::AdminToken => "admin_token",
        }
    }
}

/// Process-wide credential storage shared by every request.
///
/// Writes are last-write-wins.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: CredentialKey) -> Result<Option<String>>;

    fn set(&self, key: CredentialKey, value: &str) -> Result<()>;

    /// Remove a value. Removing an absent key is not an error.
    fn remove(&self, key: CredentialKey) -> Result<()>;

    /// Remove every key (explicit logout).
    fn clear(&self) -> Result<()> {
        for key in CredentialKey::ALL {
            self.remove(key)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    values: RwLock<HashMap<CredentialKey, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with an auth token
    pub fn with_auth_token(token: &str) -> Self {
        let store = Self::new();
        if let Ok(mut values) = store.values.write() {
            values.insert(CredentialKey::AuthToken, token.to_string());
        }
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>> {
        let values = self
            .values
            .read()
            .map_err(|_| anyhow::anyhow!("Credential store lock poisoned"))?;
        Ok(values.get(&key).cloned())
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| anyhow::anyhow!("Credential store lock poisoned"))?;
        values.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: CredentialKey) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| anyhow::anyhow!("Credential store lock poisoned"))?;
        values.remove(&key);
        Ok(())
    }
}

/// Credentials kept in the OS keychain, one entry per key.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a custom keychain service name (e.g. one per backend deployment)
    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: CredentialKey) -> Result<Entry> {
        Entry::new(&self.service, key.as_str()).context("Failed to create keyring entry")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credential from keychain"),
        }
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store credential in keychain")
    }

    fn remove(&self, key: CredentialKey) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}
