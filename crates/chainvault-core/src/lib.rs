pub mod block;
pub mod constants;
pub mod error;
pub mod principal;
pub mod types;

pub use block::{Block, OffChainReference};
pub use constants::*;
pub use error::{CryptoError, IntegrityError, IoError, SecurityError, StateError, ValidationError};
pub use principal::AuthorizedKeyRecord;
pub use types::{BlockHash, BlockNumber, PublicKeyBytes, Role, SignatureBytes, Timestamp};
