//! The language-neutral error taxonomy (spec §7), expressed as `thiserror`
//! enums. Each crate boundary that needs a subset composes it in with
//! `#[from]`/`#[error(transparent)]`; `chainvault-facade::LedgerError` is the
//! final composition an embedder sees.
//!
//! Propagation policy: security and integrity errors are always surfaced,
//! never swallowed. Decryption/authentication failures carry no detail that
//! would let a caller distinguish wrong-password from corruption.

use thiserror::Error;

use crate::types::{BlockNumber, Role};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("payload must not be null or empty")]
    EmptyPayload,

    #[error("owner name exceeds maximum length of {max} characters")]
    OwnerNameTooLong { max: usize },

    #[error("serialized payload of {got} bytes exceeds the {max}-byte ceiling")]
    PayloadTooLarge { got: usize, max: usize },

    #[error("export path must end in .json")]
    InvalidExportExtension,
}

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("signature verification failed")]
    Authentication,

    #[error("permission denied: caller role {caller_role} may not perform {op} on target role {target_role}")]
    PermissionDenied {
        caller_role: Role,
        target_role: Role,
        op: String,
    },

    #[error("bootstrap violation: a caller-less write is only permitted once, to create the first SUPER_ADMIN")]
    BootstrapViolation,

    #[error("cannot revoke the last active SUPER_ADMIN")]
    LastSuperAdmin,

    #[error("path traversal rejected: {0}")]
    PathTraversal(String),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Deliberately undifferentiated: wrong key, wrong password, and
    /// ciphertext corruption all surface identically (spec §7, §4.1).
    #[error("decryption failed")]
    Authentication,

    #[error("unsupported algorithm or envelope version: {0}")]
    Unsupported(String),
}

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("hash mismatch at block {0}")]
    HashMismatch(BlockNumber),

    #[error("chain break at block {0}: previous_hash does not match the prior block's hash")]
    ChainBreak(BlockNumber),

    #[error("signature mismatch at block {0}")]
    SignatureMismatch(BlockNumber),
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("blockchain master encryption key is not initialized")]
    BmekMissing,

    #[error("component not initialized")]
    NotInitialized,

    #[error("already exists")]
    AlreadyExists,

    #[error("exceeds configured limit of {limit}")]
    TooLarge { limit: u64 },
}

#[derive(Debug, Error)]
pub enum IoError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
