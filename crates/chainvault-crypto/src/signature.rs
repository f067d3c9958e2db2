//! ML-DSA-87 (NIST FIPS 204, level-5 parameter set) sign/verify.
//!
//! `pqcrypto-dilithium`'s `dilithium5` module is the closest crate mapping
//! to "ML-DSA-87" available in the ecosystem (see DESIGN.md). ML-DSA does
//! not support deriving a public key from a private one — both halves of a
//! key pair must be persisted together (spec §4.1's contract), which is why
//! [`KeyPair`] always carries both.

use chainvault_core::{CryptoError, PublicKeyBytes, SignatureBytes};
use pqcrypto_dilithium::dilithium5;
use pqcrypto_traits::sign::{DetachedSignature, PublicKey, SecretKey};
use zeroize::Zeroizing;

/// An ML-DSA-87 key pair. The secret half is zeroized on drop.
pub struct KeyPair {
    pub public_key: PublicKeyBytes,
    secret_key: Zeroizing<Vec<u8>>,
}

impl KeyPair {
    /// Generate a fresh key pair.
    pub fn generate() -> Self {
        let (pk, sk) = dilithium5::keypair();
        Self {
            public_key: PublicKeyBytes(pk.as_bytes().to_vec()),
            secret_key: Zeroizing::new(sk.as_bytes().to_vec()),
        }
    }

    /// Reconstruct a key pair from raw bytes (e.g. loaded from a `KeyStore`).
    pub fn from_raw(public_key: Vec<u8>, secret_key: Vec<u8>) -> Self {
        Self {
            public_key: PublicKeyBytes(public_key),
            secret_key: Zeroizing::new(secret_key),
        }
    }

    pub fn secret_key_bytes(&self) -> &[u8] {
        &self.secret_key
    }

    pub fn sign(&self, message: &[u8]) -> Result<SignatureBytes, CryptoError> {
        sign(&self.secret_key, message)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ public_key: {:?} }}", self.public_key)
    }
}

/// Sign `message` with a raw ML-DSA-87 secret key. Returns a detached signature.
pub fn sign(secret_key_bytes: &[u8], message: &[u8]) -> Result<SignatureBytes, CryptoError> {
    let sk = dilithium5::SecretKey::from_bytes(secret_key_bytes)
        .map_err(|_| CryptoError::Unsupported("malformed ML-DSA-87 secret key".into()))?;
    let sig = dilithium5::detached_sign(message, &sk);
    Ok(SignatureBytes(sig.as_bytes().to_vec()))
}

/// Verify a detached ML-DSA-87 signature.
pub fn verify(
    public_key: &PublicKeyBytes,
    message: &[u8],
    signature: &SignatureBytes,
) -> Result<(), CryptoError> {
    let pk = dilithium5::PublicKey::from_bytes(&public_key.0)
        .map_err(|_| CryptoError::Unsupported("malformed ML-DSA-87 public key".into()))?;
    let sig = dilithium5::DetachedSignature::from_bytes(&signature.0)
        .map_err(|_| CryptoError::Authentication)?;
    dilithium5::verify_detached_signature(&sig, message, &pk).map_err(|_| CryptoError::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let kp = KeyPair::generate();
        let message = b"append-only ledger block pre-image";
        let sig = kp.sign(message).unwrap();
        assert!(verify(&kp.public_key, message, &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"original").unwrap();
        assert!(verify(&kp.public_key, b"tampered", &sig).is_err());
    }

    #[test]
    fn wrong_key_fails() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let sig = kp1.sign(b"message").unwrap();
        assert!(verify(&kp2.public_key, b"message", &sig).is_err());
    }
}
