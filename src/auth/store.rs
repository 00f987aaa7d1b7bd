//! Local persistence for cached credentials.
//!
//! [`FirebaseAuth`](super::FirebaseAuth) only needs get/set/delete by key, so hosts can plug
//! in whatever storage they already have. [`EncryptedFileStore`] keeps one encrypted file per
//! key on disk; [`InMemoryStore`] keeps nothing beyond the process.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

const NONCE_SIZE: usize = 12;
const KEY_DOMAIN: &[u8] = b"firebase-lite-credential-store-v1";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential file is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("credential file could not be decrypted: {0}")]
    Crypto(String),
    #[error("credential file is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Key-value storage for serialized credentials.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Removing a key that is not present is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Stores each key as an AES-256-GCM encrypted file inside `dir`.
///
/// The cipher key is derived from a passphrase, normally the Firebase API key. That key ships
/// inside the client, so this only keeps the file from being read casually.
pub struct EncryptedFileStore {
    dir: PathBuf,
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for EncryptedFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFileStore")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl EncryptedFileStore {
    pub fn new(dir: impl AsRef<Path>, passphrase: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(KEY_DOMAIN);
        hasher.update(passphrase.as_bytes());
        let digest = hasher.finalize();

        Self {
            dir: dir.as_ref().to_path_buf(),
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&digest)),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn encrypt(&self, plaintext: &str) -> Result<String, StoreError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| StoreError::Crypto(e.to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }

    fn decrypt(&self, encoded: &str) -> Result<String, StoreError> {
        let combined = BASE64.decode(encoded.trim())?;
        if combined.len() < NONCE_SIZE {
            return Err(StoreError::Crypto("encrypted data too short".to_string()));
        }

        let (nonce, ciphertext) = combined.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| StoreError::Crypto(e.to_string()))?;

        Ok(String::from_utf8(plaintext)?)
    }
}

impl CredentialStore for EncryptedFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let encoded = match std::fs::read_to_string(self.path_for(key)) {
            Ok(encoded) => encoded,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        self.decrypt(&encoded).map(Some)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let encoded = self.encrypt(value)?;
        std::fs::write(self.path_for(key), encoded)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}
