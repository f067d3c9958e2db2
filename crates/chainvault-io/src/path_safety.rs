//! Path safeguards shared by export and import (spec §4.12's Input
//! validation step 3): extension check, `..` rejection, and a
//! canonicalization-based check that the target never escapes a configured
//! root directory.

use std::path::{Component, Path};

use chainvault_core::{SecurityError, ValidationError};

pub fn require_json_extension(path: &Path) -> Result<(), ValidationError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(()),
        _ => Err(ValidationError::InvalidExportExtension),
    }
}

pub fn reject_parent_traversal(path: &Path) -> Result<(), SecurityError> {
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        Err(SecurityError::PathTraversal(path.display().to_string()))
    } else {
        Ok(())
    }
}

/// Canonicalizes `dir` and `allowed_root` and confirms the former is nested
/// under the latter — the belt to `reject_parent_traversal`'s suspenders,
/// catching symlink-based escapes a lexical `..` check alone would miss.
pub fn require_within_root(dir: &Path, allowed_root: &Path) -> Result<(), SecurityError> {
    let canonical_dir = dir
        .canonicalize()
        .map_err(|_| SecurityError::PathTraversal(dir.display().to_string()))?;
    let canonical_root = allowed_root
        .canonicalize()
        .map_err(|_| SecurityError::PathTraversal(allowed_root.display().to_string()))?;
    if canonical_dir.starts_with(&canonical_root) {
        Ok(())
    } else {
        Err(SecurityError::PathTraversal(dir.display().to_string()))
    }
}
