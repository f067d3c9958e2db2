//! `ChainEngine`'s composed error type. Downstream (`chainvault-facade`)
//! flattens this further into the final `LedgerError` an embedder sees.

use chainvault_core::{CryptoError, IntegrityError, IoError, SecurityError, StateError, ValidationError};
use chainvault_offchain::OffChainError;
use chainvault_rbac::RepositoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    OffChain(#[from] OffChainError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("block {0} not found")]
    BlockNotFound(u64),
}
