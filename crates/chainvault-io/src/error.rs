use chainvault_core::{BlockNumber, IoError, SecurityError, ValidationError};
use chainvault_offchain::OffChainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] IoError),

    #[error(transparent)]
    OffChain(#[from] OffChainError),

    #[error("serialization error: {0}")]
    Serde(String),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] IoError),

    #[error(transparent)]
    OffChain(#[from] OffChainError),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error("malformed field in snapshot: {0}")]
    Malformed(&'static str),

    #[error("unsupported export schema version {0}")]
    UnsupportedSchema(u32),

    #[error("integrity check failed at block {0}")]
    Integrity(BlockNumber),

    #[error("import target is not an empty chain")]
    NotEmpty,
}
