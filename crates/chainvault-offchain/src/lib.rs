pub mod store;

pub use store::{find_orphans, OffChainError, OffChainStore};
