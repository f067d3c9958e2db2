//! The append-only ledger's write/read/validate core (spec §4.8, §4.9,
//! §4.10): everything downstream of storage and crypto, upstream of the
//! façade.

pub mod engine;
pub mod error;
pub mod lock;
pub mod validator;

pub use engine::{ChainEngine, EncryptionRequest};
pub use error::ChainError;
pub use lock::ConcurrencyControl;
pub use validator::{ChainValidator, ValidationFailure, ValidationReport};
