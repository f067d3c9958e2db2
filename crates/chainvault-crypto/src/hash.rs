use chainvault_core::BlockHash;
use sha3::{Digest, Sha3_256};

/// Compute SHA3-256 of arbitrary bytes.
pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA3-256 and return it as a [`BlockHash`].
pub fn block_hash(data: &[u8]) -> BlockHash {
    BlockHash::from_bytes(sha3_256(data))
}

/// Lowercase hex SHA3-256 digest, e.g. for off-chain content addressing.
pub fn sha3_256_hex(data: &[u8]) -> String {
    hex::encode(sha3_256(data))
}
