pub mod aead;
pub mod envelope;
pub mod hash;
pub mod kdf;
pub mod signature;

pub use aead::SecretKey;
pub use hash::{block_hash, sha3_256, sha3_256_hex};
pub use signature::KeyPair;
