//! The atomic ledger unit and its off-chain reference payload.
//!
//! Field layout and the hashable-field set implement Invariant BL-1
//! (immutability of the hash pre-image) and BL-2 (canonical pre-image):
//! `block_number`, `timestamp`, `previous_hash`, `data`, `signer_public_key`
//! participate in the hash. `is_encrypted`, `encryption_metadata`,
//! `off_chain_reference`, `manual_keywords`, and `auto_keywords` never do —
//! retroactive encryption (see `chainvault-chain::encrypt_existing`) only
//! ever touches those fields.

use serde::{Deserialize, Serialize};

use crate::types::{BlockHash, BlockNumber, PublicKeyBytes, SignatureBytes, Timestamp};

/// A content-addressed pointer to a payload stored off-chain (§4.5).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffChainReference {
    /// SHA3-256 hex digest of the plaintext; also the off-chain file's stem.
    pub content_hash: String,
    pub size: u64,
    pub content_type: String,
}

/// The atomic unit of the ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub block_number: BlockNumber,
    pub timestamp: Timestamp,
    pub previous_hash: BlockHash,

    /// Opaque payload. For an off-chain block this holds a serialized
    /// [`OffChainReference`] instead of the raw payload (see §4.5). Once
    /// written, this field is never modified (Invariant BL-1): retroactive
    /// encryption leaves it bit-identical to its value at creation.
    pub data: String,

    pub signer_public_key: PublicKeyBytes,
    pub signature: SignatureBytes,
    pub hash: BlockHash,

    pub is_encrypted: bool,
    /// Populated by fresh BMEK encryption or by retroactive encryption.
    /// Holds the `BMEK-v1.0`/`GCM-v1.0` envelope described in
    /// `chainvault-crypto::envelope`.
    pub encryption_metadata: Option<String>,

    pub off_chain_reference: Option<OffChainReference>,

    /// Space-delimited public search terms.
    pub manual_keywords: Option<String>,
    /// AES-GCM-encrypted private search terms.
    pub auto_keywords: Option<String>,
}

impl Block {
    /// The byte sequence that is both hashed and signed (Invariant BL-2).
    ///
    /// Field order is fixed and must never change: `block_number`,
    /// `timestamp`, `previous_hash`, `data`, `signer_public_key`. Every
    /// caller — `hash()`, signing, and verification — goes through this one
    /// function so the pre-image can never drift between the two uses.
    pub fn canonical_preimage(
        block_number: BlockNumber,
        timestamp: Timestamp,
        previous_hash: &BlockHash,
        data: &str,
        signer_public_key: &PublicKeyBytes,
    ) -> Vec<u8> {
        let mut buf = Vec::with_capacity(data.len() + 128);
        buf.extend_from_slice(&block_number.to_be_bytes());
        buf.extend_from_slice(&timestamp.to_be_bytes());
        buf.extend_from_slice(previous_hash.as_bytes());
        buf.extend_from_slice(&(data.len() as u64).to_be_bytes());
        buf.extend_from_slice(data.as_bytes());
        buf.extend_from_slice(&(signer_public_key.0.len() as u64).to_be_bytes());
        buf.extend_from_slice(&signer_public_key.0);
        buf
    }

    /// This block's own pre-image, from its current field values.
    pub fn preimage(&self) -> Vec<u8> {
        Self::canonical_preimage(
            self.block_number,
            self.timestamp,
            &self.previous_hash,
            &self.data,
            &self.signer_public_key,
        )
    }

    pub fn is_genesis(&self) -> bool {
        self.block_number == 0
    }
}
