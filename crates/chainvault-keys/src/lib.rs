pub mod bmek;
pub mod keystore;

pub use bmek::{BmekError, BmekManager};
pub use keystore::{KeyStore, KeyStoreError};
