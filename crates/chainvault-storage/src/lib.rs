pub mod db;

pub use db::{LedgerDb, OffChainIndexEntry};

/// Storage errors are represented by `chainvault_core::IoError` so callers
/// up the stack compose them into `LedgerError` without a second wrapper.
pub use chainvault_core::IoError as StorageError;
