//! Async secondary-index update coordination (spec §4.11), kept as a
//! strictly eventual-consistency boundary downstream of the chain.

pub mod coordinator;

pub use coordinator::{IndexingCoordinator, IndexingError, IndexingRequest};
