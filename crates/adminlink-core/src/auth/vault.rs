//! Passphrase-sealed credential file.
//!
//! The file is a JSON envelope `{version, salt, nonce, ciphertext}`. The key is
//! derived with Argon2id from the passphrase and salt; the payload (a JSON map
//! of credential key to value) is sealed with ChaCha20-Poly1305. Every write
//! uses a fresh nonce.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::credentials::{CredentialKey, CredentialStore};

const VAULT_VERSION: u32 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    salt: Vec<u8>,
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
}

pub struct EncryptedFileStore {
    path: PathBuf,
    salt: [u8; SALT_LEN],
    cipher: ChaCha20Poly1305,
    values: Mutex<HashMap<String, String>>,
}

impl std::fmt::Debug for EncryptedFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFileStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl EncryptedFileStore {
    /// Open an existing vault or start a new one at `path`.
    ///
    /// Fails if the file exists but cannot be decrypted with `passphrase`.
    pub fn open(path: impl AsRef<Path>, passphrase: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            let mut salt = [0u8; SALT_LEN];
            rand::thread_rng().fill_bytes(&mut salt);
            let cipher = Self::derive_cipher(passphrase, &salt)?;
            debug!(path = %path.display(), "Creating new credential vault");
            return Ok(Self {
                path,
                salt,
                cipher,
                values: Mutex::new(HashMap::new()),
            });
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read credential vault {}", path.display()))?;
        let envelope: Envelope =
            serde_json::from_str(&contents).context("Failed to parse credential vault")?;

        if envelope.version != VAULT_VERSION {
            anyhow::bail!("Unsupported credential vault version {}", envelope.version);
        }
        let salt: [u8; SALT_LEN] = envelope
            .salt
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("Credential vault has a malformed salt"))?;
        if envelope.nonce.len() != NONCE_LEN {
            anyhow::bail!("Credential vault has a malformed nonce");
        }

        let cipher = Self::derive_cipher(passphrase, &salt)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&envelope.nonce), envelope.ciphertext.as_slice())
            .map_err(|_| anyhow::anyhow!("Failed to decrypt credential vault (wrong passphrase?)"))?;
        let values: HashMap<String, String> =
            serde_json::from_slice(&plaintext).context("Credential vault payload is corrupt")?;

        debug!(path = %path.display(), entries = values.len(), "Opened credential vault");
        Ok(Self {
            path,
            salt,
            cipher,
            values: Mutex::new(values),
        })
    }

    fn derive_cipher(passphrase: &str, salt: &[u8]) -> Result<ChaCha20Poly1305> {
        let mut key = [0u8; KEY_LEN];
        Argon2::default()
            .hash_password_into(passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| anyhow::anyhow!("Key derivation failed: {}", e))?;
        Ok(ChaCha20Poly1305::new(Key::from_slice(&key)))
    }

    fn persist(&self, values: &HashMap<String, String>) -> Result<()> {
        let plaintext = serde_json::to_vec(values)?;
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| anyhow::anyhow!("Failed to encrypt credential vault"))?;

        let envelope = Envelope {
            version: VAULT_VERSION,
            salt: self.salt.to_vec(),
            nonce: nonce.to_vec(),
            ciphertext,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string(&envelope)?)
            .with_context(|| format!("Failed to write credential vault {}", self.path.display()))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| anyhow::anyhow!("Credential vault lock poisoned"))
    }
}

impl CredentialStore for EncryptedFileStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>> {
        Ok(self.lock()?.get(key.as_str()).cloned())
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<()> {
        let mut values = self.lock()?;
        values.insert(key.as_str().to_string(), value.to_string());
        self.persist(&values)
    }

    fn remove(&self, key: CredentialKey) -> Result<()> {
        let mut values = self.lock()?;
        if values.remove(key.as_str()).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }
}
