//! Encryption at rest for cached data.
//!
//! The cached user profile holds contact details, so the cache can be sealed
//! with ChaCha20-Poly1305. The key is derived from a passphrase with Argon2
//! and a random salt that lives next to the data in the wrapped store.

use argon2::Argon2;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;
use tracing::debug;

use super::store::{KeyValueStore, StoreError};

/// Key under which the salt is kept in the wrapped store
pub const SALT_KEY: &str = "__salt";

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

pub struct EncryptedStore<S> {
    inner: S,
    cipher: ChaCha20Poly1305,
}

impl<S: KeyValueStore> EncryptedStore<S> {
    /// Wrap `inner`, creating and persisting a salt on first use.
    pub async fn open(inner: S, passphrase: &str) -> Result<Self, StoreError> {
        let salt = match inner.get(SALT_KEY).await? {
            Some(encoded) => STANDARD
                .decode(encoded.trim())
                .map_err(|e| StoreError::Crypto(format!("Invalid salt: {}", e)))?,
            None => {
                let mut salt = [0u8; SALT_LEN];
                rand::thread_rng().fill_bytes(&mut salt);
                inner.set(SALT_KEY, &STANDARD.encode(salt)).await?;
                debug!("Created new cache encryption salt");
                salt.to_vec()
            }
        };

        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(passphrase.as_bytes(), &salt, &mut key)
            .map_err(|e| StoreError::Crypto(format!("Key derivation failed: {}", e)))?;

        Ok(Self {
            inner,
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        })
    }

    fn seal(&self, plaintext: &str) -> Result<String, StoreError> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| StoreError::Crypto("Encryption failed".to_string()))?;

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    fn open_sealed(&self, key: &str, sealed: &str) -> Result<String, StoreError> {
        let bytes = STANDARD
            .decode(sealed.trim())
            .map_err(|e| StoreError::Crypto(format!("Entry {} is not base64: {}", key, e)))?;
        if bytes.len() < NONCE_LEN {
            return Err(StoreError::Crypto(format!("Entry {} is truncated", key)));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| {
                StoreError::Crypto(format!("Could not decrypt {} (wrong passphrase?)", key))
            })?;

        String::from_utf8(plaintext)
            .map_err(|_| StoreError::Crypto(format!("Entry {} is not UTF-8", key)))
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for EncryptedStore<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.inner.get(key).await? {
            Some(sealed) => self.open_sealed(key, &sealed).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let sealed = self.seal(value)?;
        self.inner.set(key, &sealed).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.inner.remove(keys).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::FileStore;

    async fn open_store(dir: &tempfile::TempDir, passphrase: &str) -> EncryptedStore<FileStore> {
        let inner = FileStore::new(dir.path().to_path_buf()).unwrap();
        EncryptedStore::open(inner, passphrase).await.unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_is_not_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, "hunter22").await;

        store.set("userInfo", r#"{"email":"eva.young@example.com"}"#).await.unwrap();
        assert_eq!(
            store.get("userInfo").await.unwrap().as_deref(),
            Some(r#"{"email":"eva.young@example.com"}"#)
        );

        let raw = std::fs::read_to_string(dir.path().join("userInfo.json")).unwrap();
        assert!(!raw.contains("eva.young"));
    }

    #[tokio::test]
    async fn test_reopen_with_same_passphrase() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open_store(&dir, "hunter22").await;
            store.set("events", "[]").await.unwrap();
        }

        let reopened = open_store(&dir, "hunter22").await;
        assert_eq!(reopened.get("events").await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_wrong_passphrase_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, "hunter22").await;
        store.set("events", "[]").await.unwrap();

        let wrong = open_store(&dir, "letmein").await;
        assert!(matches!(wrong.get("events").await, Err(StoreError::Crypto(_))));
    }
}
