//! `KeyStore` (spec §4.3): encrypted at-rest storage of user ML-DSA-87 key
//! pairs, one file per owner:
//!
//! ```text
//! [16-byte salt][12-byte IV][ciphertext || 16-byte tag]
//! ```
//!
//! keyed by PBKDF2-HMAC-SHA512(password, salt). Wrong password and file
//! corruption both surface as [`KeyStoreError::Authentication`] — no side
//! channel distinguishes the two (spec §4.3, §4.1's contract).

use std::fs;
use std::path::{Path, PathBuf};

use chainvault_core::{PBKDF2_SALT_LEN, AES_NONCE_LEN};
use chainvault_crypto::{aead, kdf, KeyPair};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("decryption failed")]
    Authentication,

    #[error("no key stored for owner {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Serialize, Deserialize)]
struct StoredKeyPair {
    public_key: Vec<u8>,
    secret_key: Vec<u8>,
}

/// Encrypted at-rest store of user key pairs, one file per owner name.
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, owner: &str) -> PathBuf {
        self.dir.join(format!("{owner}.keystore"))
    }

    pub fn save(&self, owner: &str, key_pair: &KeyPair, password: &str) -> Result<(), KeyStoreError> {
        fs::create_dir_all(&self.dir)?;
        let stored = StoredKeyPair {
            public_key: key_pair.public_key.0.clone(),
            secret_key: key_pair.secret_key_bytes().to_vec(),
        };
        let plaintext =
            serde_json::to_vec(&stored).map_err(|e| KeyStoreError::Serialization(e.to_string()))?;

        let salt = aead::random_salt();
        let derived = kdf::derive_key(password.as_bytes(), &salt);
        let (iv, ciphertext) = aead::encrypt(&derived, &plaintext)
            .map_err(|_| KeyStoreError::Authentication)?;

        let mut file_bytes = Vec::with_capacity(PBKDF2_SALT_LEN + AES_NONCE_LEN + ciphertext.len());
        file_bytes.extend_from_slice(&salt);
        file_bytes.extend_from_slice(&iv);
        file_bytes.extend_from_slice(&ciphertext);

        fs::write(self.path_for(owner), file_bytes)?;
        Ok(())
    }

    pub fn load(&self, owner: &str, password: &str) -> Result<KeyPair, KeyStoreError> {
        let path = self.path_for(owner);
        if !path.exists() {
            return Err(KeyStoreError::NotFound(owner.to_string()));
        }
        let file_bytes = fs::read(&path)?;
        if file_bytes.len() < PBKDF2_SALT_LEN + AES_NONCE_LEN {
            return Err(KeyStoreError::Authentication);
        }
        let (salt, rest) = file_bytes.split_at(PBKDF2_SALT_LEN);
        let (iv, ciphertext) = rest.split_at(AES_NONCE_LEN);

        let derived = kdf::derive_key(password.as_bytes(), salt);
        let plaintext = aead::decrypt(&derived, iv, ciphertext)
            .map_err(|_| KeyStoreError::Authentication)?;
        let stored: StoredKeyPair =
            serde_json::from_slice(&plaintext).map_err(|_| KeyStoreError::Authentication)?;

        Ok(KeyPair::from_raw(stored.public_key, stored.secret_key))
    }

    pub fn exists(&self, owner: &str) -> bool {
        self.path_for(owner).exists()
    }

    pub fn delete(&self, owner: &str) -> Result<(), KeyStoreError> {
        let path = self.path_for(owner);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<String>, KeyStoreError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut owners = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(owner) = name.strip_suffix(".keystore") {
                    owners.push(owner.to_string());
                }
            }
        }
        owners.sort();
        Ok(owners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        let kp = KeyPair::generate();
        store.save("alice", &kp, "correct horse battery staple").unwrap();

        let loaded = store.load("alice", "correct horse battery staple").unwrap();
        assert_eq!(loaded.public_key.0, kp.public_key.0);
    }

    #[test]
    fn wrong_password_fails_generically() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        let kp = KeyPair::generate();
        store.save("bob", &kp, "right password").unwrap();

        let err = store.load("bob", "wrong password").unwrap_err();
        assert!(matches!(err, KeyStoreError::Authentication));
    }

    #[test]
    fn list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        store.save("carol", &KeyPair::generate(), "pw").unwrap();
        store.save("dave", &KeyPair::generate(), "pw").unwrap();

        let mut owners = store.list().unwrap();
        owners.sort();
        assert_eq!(owners, vec!["carol".to_string(), "dave".to_string()]);

        store.delete("carol").unwrap();
        assert!(!store.exists("carol"));
        assert!(store.exists("dave"));
    }
}
