//! Canonical chain snapshot export/import (spec §4.12), with path-traversal
//! safeguards and fail-fast, nothing-partially-committed import.

pub mod error;
pub mod export_import;
pub mod path_safety;
pub mod snapshot;

pub use error::{ExportError, ImportError};
pub use export_import::{export_chain, import_chain};
pub use snapshot::{ExportedBlock, ExportedKey, ExportSnapshot};
