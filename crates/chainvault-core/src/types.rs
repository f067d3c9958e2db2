use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotone, contiguous block number starting at 0.
pub type BlockNumber = u64;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

// ── BlockHash ────────────────────────────────────────────────────────────────

/// SHA3-256 digest of a block's canonical pre-image.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding, as required by Invariant BL-3 and the export format.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The genesis block's `previous_hash`: 64 hex zeros.
    pub fn zero() -> Self {
        Self([0u8; 32])
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({}…)", &self.to_hex()[..16])
    }
}

// ── PublicKeyBytes / SignatureBytes ───────────────────────────────────────────

/// String-encoded ML-DSA-87 public key. Encoding is base64 (see `to_encoded`).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeyBytes(pub Vec<u8>);

impl PublicKeyBytes {
    pub fn to_encoded(&self) -> String {
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &self.0)
    }

    pub fn from_encoded(s: &str) -> Result<Self, base64::DecodeError> {
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, s).map(Self)
    }
}

impl fmt::Debug for PublicKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyBytes({}b)", self.0.len())
    }
}

impl fmt::Display for PublicKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_encoded())
    }
}

/// A detached ML-DSA-87 signature over a block's canonical pre-image.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBytes(pub Vec<u8>);

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({}b)", self.0.len())
    }
}

// ── Role ───────────────────────────────────────────────────────────────────────

/// Principal role. Declared low-to-high so the derived `Ord` matches the
/// privilege ordering `SuperAdmin > Admin > User > ReadOnly`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    ReadOnly,
    User,
    Admin,
    SuperAdmin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::ReadOnly => "READ_ONLY",
            Role::User => "USER",
            Role::Admin => "ADMIN",
            Role::SuperAdmin => "SUPER_ADMIN",
        };
        write!(f, "{s}")
    }
}
