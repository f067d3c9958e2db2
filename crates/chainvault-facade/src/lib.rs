//! `chainvault-facade`: the only crate an embedder imports. `Ledger`
//! orchestrates every component behind one `impl` block; `LedgerConfig`
//! collects every tunable; `LedgerError` is the flattened error type.

pub mod config;
pub mod error;
pub mod ledger;

pub use config::LedgerConfig;
pub use error::LedgerError;
pub use ledger::Ledger;
