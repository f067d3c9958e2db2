//! `BMEKManager` (spec §4.2): singleton lifecycle for the 256-bit Blockchain
//! Master Encryption Key.
//!
//! The key is cached with double-checked locking over a `parking_lot::RwLock`,
//! mirroring the ancestor workspace's zeroize-on-drop discipline for secret
//! material (`chronx-crypto::keypair::KeyPair`) applied here to a
//! process-wide singleton instead of a per-call value.

use std::fs;
use std::path::{Path, PathBuf};

use chainvault_core::DEFAULT_BMEK_FILENAME;
use chainvault_crypto::SecretKey;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BmekError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("BMEK file is corrupt: {0}")]
    Corrupt(String),
}

/// Lifecycle manager for the blockchain master encryption key.
///
/// One `BmekManager` per deployment root. `get()` loads the key from disk on
/// first use and caches it in memory; `clear_cache`/`import_base64` drop the
/// cached value so the next `get()` re-reads the file.
pub struct BmekManager {
    path: PathBuf,
    cache: RwLock<Option<SecretKey>>,
}

impl BmekManager {
    pub fn new<P: AsRef<Path>>(key_dir: P) -> Self {
        Self {
            path: key_dir.as_ref().join(DEFAULT_BMEK_FILENAME),
            cache: RwLock::new(None),
        }
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: RwLock::new(None),
        }
    }

    /// Idempotent: creates the key file (permissions `0600`) if absent,
    /// validates it if present.
    pub fn initialize(&self) -> Result<(), BmekError> {
        if self.exists() {
            self.read_and_validate()?;
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let key = SecretKey::generate();
        self.write_key_file(&key)?;
        info!(path = %self.path.display(), "BMEK initialized");
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Thread-safe, double-checked cache read: an optimistic read-lock check
    /// first, then a write-lock-guarded load on miss.
    pub fn get(&self) -> Result<SecretKey, BmekError> {
        if let Some(key) = self.cache.read().as_ref() {
            return Ok(key.clone());
        }
        let mut guard = self.cache.write();
        if let Some(key) = guard.as_ref() {
            return Ok(key.clone());
        }
        let key = self.read_and_validate()?;
        *guard = Some(key.clone());
        Ok(key)
    }

    /// Base64-encoded export, for offline backup. Never transmitted by this
    /// crate — the caller owns what happens to the returned string. Logs an
    /// audit line noting that an export occurred (never the key itself).
    pub fn export_base64(&self) -> Result<String, BmekError> {
        let key = self.get()?;
        warn!(path = %self.path.display(), "BMEK exported for offline backup");
        Ok(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            key.as_bytes(),
        ))
    }

    /// Overwrite the on-disk BMEK with `encoded`. Old ciphertexts become
    /// undecryptable unless the imported key is byte-identical to the one
    /// they were encrypted with — the caller must pass `acknowledge_overwrite`
    /// to make that irreversible consequence explicit at the call site.
    pub fn import_base64(&self, encoded: &str, acknowledge_overwrite: bool) -> Result<(), BmekError> {
        if !acknowledge_overwrite {
            return Err(BmekError::Corrupt(
                "import requires explicit acknowledge_overwrite=true".into(),
            ));
        }
        let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded.trim())
            .map_err(|e| BmekError::Corrupt(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(BmekError::Corrupt(format!(
                "expected 32-byte key, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        let key = SecretKey::from_bytes(arr);
        self.write_key_file(&key)?;
        self.clear_cache();
        warn!(path = %self.path.display(), "BMEK imported, overwriting prior key");
        Ok(())
    }

    /// Drop the in-memory cache; the next `get()` re-reads the file.
    pub fn clear_cache(&self) {
        *self.cache.write() = None;
    }

    fn read_and_validate(&self) -> Result<SecretKey, BmekError> {
        let contents = fs::read_to_string(&self.path)?;
        let trimmed = contents.trim_end_matches(['\n', '\r']);
        let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, trimmed)
            .map_err(|e| BmekError::Corrupt(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(BmekError::Corrupt(format!(
                "expected 32-byte key, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(SecretKey::from_bytes(arr))
    }

    fn write_key_file(&self, key: &SecretKey) -> Result<(), BmekError> {
        let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, key.as_bytes());
        fs::write(&self.path, format!("{encoded}\n"))?;
        harden_permissions(&self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn harden_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn harden_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = BmekManager::new(dir.path());
        mgr.initialize().unwrap();
        let key1 = mgr.get().unwrap();
        mgr.initialize().unwrap();
        let key2 = mgr.get().unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn export_import_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = BmekManager::new(dir.path());
        mgr.initialize().unwrap();
        let exported = mgr.export_base64().unwrap();

        let dir2 = tempfile::tempdir().unwrap();
        let mgr2 = BmekManager::new(dir2.path());
        mgr2.initialize().unwrap();
        mgr2.import_base64(&exported, true).unwrap();
        assert_eq!(mgr.get().unwrap().as_bytes(), mgr2.get().unwrap().as_bytes());
    }

    #[test]
    fn import_without_acknowledgement_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = BmekManager::new(dir.path());
        mgr.initialize().unwrap();
        let exported = mgr.export_base64().unwrap();
        assert!(mgr.import_base64(&exported, false).is_err());
    }

    #[test]
    fn clear_cache_forces_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = BmekManager::new(dir.path());
        mgr.initialize().unwrap();
        let key1 = mgr.get().unwrap();
        mgr.clear_cache();
        let key2 = mgr.get().unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn corrupt_file_reports_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = BmekManager::new(dir.path());
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join(DEFAULT_BMEK_FILENAME), "not base64!!").unwrap();
        assert!(matches!(mgr.get(), Err(BmekError::Corrupt(_))));
    }

    #[cfg(unix)]
    #[test]
    fn file_permissions_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let mgr = BmekManager::new(dir.path());
        mgr.initialize().unwrap();
        let perms = fs::metadata(dir.path().join(DEFAULT_BMEK_FILENAME))
            .unwrap()
            .permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }
}
