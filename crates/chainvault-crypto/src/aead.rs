//! AES-256-GCM with a random 96-bit IV and 128-bit authentication tag.
//!
//! Grounded in the sibling workspace's `shared-crypto::symmetric` module
//! (free `encrypt`/`decrypt` functions over a `SecretKey` newtype), adapted
//! to AES-256-GCM specifically since the design's bit-exact requirement
//! (spec §6) rules out the ancestor's default XChaCha20-Poly1305.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use chainvault_core::CryptoError;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A 256-bit symmetric key (BMEK, a wrapped DEK, or a KeyStore/PBKDF2 key).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Generate a cryptographically secure random 96-bit IV.
pub fn random_iv() -> [u8; 12] {
    let mut iv = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

/// Generate a cryptographically secure random 128-bit salt.
pub fn random_salt() -> [u8; 16] {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// AES-256-GCM encrypt. Returns `(iv, ciphertext_with_tag)`.
pub fn encrypt(key: &SecretKey, plaintext: &[u8]) -> Result<([u8; 12], Vec<u8>), CryptoError> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let iv = random_iv();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| CryptoError::Authentication)?;
    Ok((iv, ciphertext))
}

/// AES-256-GCM decrypt. `ciphertext` must include the trailing 16-byte tag.
/// Fails indistinguishably on wrong key, wrong IV, or tampered ciphertext
/// (spec §4.1's contract: callers MUST NOT distinguish the cause).
pub fn decrypt(key: &SecretKey, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| CryptoError::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = SecretKey::generate();
        let (iv, ct) = encrypt(&key, b"hello ledger").unwrap();
        let pt = decrypt(&key, &iv, &ct).unwrap();
        assert_eq!(pt, b"hello ledger");
    }

    #[test]
    fn wrong_key_fails_generically() {
        let key1 = SecretKey::generate();
        let key2 = SecretKey::generate();
        let (iv, ct) = encrypt(&key1, b"secret").unwrap();
        let err = decrypt(&key2, &iv, &ct).unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = SecretKey::generate();
        let (iv, mut ct) = encrypt(&key, b"secret").unwrap();
        ct[0] ^= 0xFF;
        assert!(decrypt(&key, &iv, &ct).is_err());
    }
}
