//! `LedgerError`: the final, flattened error type an embedder sees,
//! composing every crate boundary's leaf error via `#[error(transparent)]`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] chainvault_core::ValidationError),

    #[error(transparent)]
    Security(#[from] chainvault_core::SecurityError),

    #[error(transparent)]
    Chain(#[from] chainvault_chain::ChainError),

    #[error(transparent)]
    Repository(#[from] chainvault_rbac::RepositoryError),

    #[error(transparent)]
    Storage(#[from] chainvault_core::IoError),

    #[error(transparent)]
    OffChain(#[from] chainvault_offchain::OffChainError),

    #[error(transparent)]
    KeyStore(#[from] chainvault_keys::KeyStoreError),

    #[error(transparent)]
    Bmek(#[from] chainvault_keys::BmekError),

    #[error(transparent)]
    Export(#[from] chainvault_io::ExportError),

    #[error(transparent)]
    Import(#[from] chainvault_io::ImportError),

    #[error(transparent)]
    Indexing(#[from] chainvault_index::IndexingError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
