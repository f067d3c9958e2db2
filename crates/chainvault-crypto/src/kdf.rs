//! PBKDF2-HMAC-SHA512 key derivation (spec §4.1, §6): 210,000 iterations,
//! 128-bit salt, 256-bit derived key.

use chainvault_core::PBKDF2_ITERATIONS;
use hmac::Hmac;
use sha2::Sha512;

use crate::aead::SecretKey;

/// Derive a 256-bit key from `password` and `salt`.
pub fn derive_key(password: &[u8], salt: &[u8]) -> SecretKey {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2::<Hmac<Sha512>>(password, salt, PBKDF2_ITERATIONS, &mut out)
        .expect("PBKDF2-HMAC-SHA512 output length is valid for any iteration count");
    SecretKey::from_bytes(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aead::random_salt;

    #[test]
    fn deterministic_for_same_inputs() {
        let salt = random_salt();
        let k1 = derive_key(b"hunter2", &salt);
        let k2 = derive_key(b"hunter2", &salt);
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn differs_by_password() {
        let salt = random_salt();
        let k1 = derive_key(b"hunter2", &salt);
        let k2 = derive_key(b"hunter3", &salt);
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }
}
