//! Authentication state: credential storage and session tracking.
//!
//! This module provides:
//! - `CredentialStore`: flat string storage for the session ID, auth token
//!   and admin token, with memory, keyring and encrypted-file backends
//! - `SessionManager`: lazily created session IDs with proactive renewal
//!
//! Session IDs live for 24 hours and are renewed once less than an hour remains.

pub mod credentials;
pub mod session;
pub mod vault;

use std::sync::Arc;

use anyhow::Result;

use crate::config::{ClientConfig, CredentialBackend};

pub use credentials::{CredentialKey, CredentialStore, KeyringCredentialStore, MemoryCredentialStore};
pub use session::SessionManager;
pub use vault::EncryptedFileStore;

/// Vault file name in the cache directory
const VAULT_FILE: &str = "credentials.vault";

/// Open the store selected by `config.credential_backend`.
///
/// The encrypted-file backend needs a passphrase; other backends ignore it.
pub fn open_store(config: &ClientConfig, passphrase: Option<&str>) -> Result<Arc<dyn CredentialStore>> {
    let store: Arc<dyn CredentialStore> = match config.credential_backend {
        CredentialBackend::Memory => Arc::new(MemoryCredentialStore::new()),
        CredentialBackend::Keyring => Arc::new(KeyringCredentialStore::new()),
        CredentialBackend::EncryptedFile => {
            let passphrase = passphrase.ok_or_else(|| {
                anyhow::anyhow!("A passphrase is required for the encrypted credential file")
            })?;
            let path = ClientConfig::cache_dir()?.join(VAULT_FILE);
            Arc::new(EncryptedFileStore::open(path, passphrase)?)
        }
    };
    Ok(store)
}
