//! `OffChainStore` (spec §4.5): content-addressed, encrypted-at-rest storage
//! for payloads at or above [`chainvault_core::OFF_CHAIN_THRESHOLD_BYTES`].
//!
//! Each object lives at `<dir>/<sha3_256_hex(plaintext)>.enc`, holding the
//! §4.4 hybrid envelope. The store is the directory's sole writer (spec's
//! entity-ownership rule); reads are shared.

use std::fs;
use std::path::{Path, PathBuf};

use chainvault_core::OffChainReference;
use chainvault_crypto::{envelope, SecretKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OffChainError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Crypto(#[from] chainvault_core::CryptoError),

    #[error("no off-chain object for content hash {0}")]
    NotFound(String),

    #[error("integrity check failed for content hash {0}")]
    IntegrityMismatch(String),
}

#[derive(Clone)]
pub struct OffChainStore {
    dir: PathBuf,
}

impl OffChainStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, OffChainError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, content_hash: &str) -> PathBuf {
        self.dir.join(format!("{content_hash}.enc"))
    }

    fn compressed_path_for(&self, content_hash: &str) -> PathBuf {
        self.dir.join(format!("{content_hash}.enc.gz"))
    }

    /// Encrypt and persist `bytes`, returning a reference the caller embeds
    /// in the block's `data` field.
    pub fn put(
        &self,
        bytes: &[u8],
        content_type: &str,
        bmek: &SecretKey,
    ) -> Result<OffChainReference, OffChainError> {
        let content_hash = chainvault_crypto::sha3_256_hex(bytes);
        let blob = envelope::encrypt(bytes, bmek)?;
        fs::write(self.path_for(&content_hash), blob)?;
        Ok(OffChainReference {
            content_hash,
            size: bytes.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    /// Retrieve and decrypt the object `reference` points to, transparently
    /// decompressing `.enc.gz` files. Off-chain storage postdates the legacy
    /// `GCM-v1.0` envelope, so objects here are always `BMEK-v1.0` and always
    /// unwrap with `bmek` directly.
    pub fn get(&self, reference: &OffChainReference, bmek: &SecretKey) -> Result<Vec<u8>, OffChainError> {
        let blob = self.read_blob(&reference.content_hash)?;
        Ok(envelope::decrypt(&blob, bmek)?)
    }

    pub fn exists(&self, content_hash: &str) -> bool {
        self.path_for(content_hash).exists() || self.compressed_path_for(content_hash).exists()
    }

    /// Decrypt the object and recompute its SHA3-256, comparing against the
    /// filename it is stored under.
    pub fn verify_integrity(&self, reference: &OffChainReference, bmek: &SecretKey) -> Result<bool, OffChainError> {
        let plaintext = self.get(reference, bmek)?;
        let recomputed = chainvault_crypto::sha3_256_hex(&plaintext);
        Ok(recomputed == reference.content_hash)
    }

    /// GZIP-compress an object in place (spec §4.5, §4.13): leaves the
    /// `.enc` file removed and a `.enc.gz` file in its place.
    pub fn compress(&self, content_hash: &str) -> Result<(), OffChainError> {
        let plain_path = self.path_for(content_hash);
        if !plain_path.exists() {
            return Ok(());
        }
        let data = fs::read(&plain_path)?;
        let gz_path = self.compressed_path_for(content_hash);
        let file = fs::File::create(&gz_path)?;
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        use std::io::Write;
        encoder.write_all(&data)?;
        encoder.finish()?;
        fs::remove_file(&plain_path)?;
        Ok(())
    }

    fn read_blob(&self, content_hash: &str) -> Result<String, OffChainError> {
        let plain_path = self.path_for(content_hash);
        if plain_path.exists() {
            return Ok(fs::read_to_string(plain_path)?);
        }
        let gz_path = self.compressed_path_for(content_hash);
        if gz_path.exists() {
            use std::io::Read;
            let file = fs::File::open(&gz_path)?;
            let mut decoder = flate2::read::GzDecoder::new(file);
            let mut out = String::new();
            decoder.read_to_string(&mut out)?;
            return Ok(out);
        }
        Err(OffChainError::NotFound(content_hash.to_string()))
    }

    /// Every `.enc`/`.enc.gz` content hash currently on disk, for orphan
    /// detection (§4.13).
    pub fn list_content_hashes(&self) -> Result<Vec<String>, OffChainError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(hash) = name.strip_suffix(".enc.gz").or_else(|| name.strip_suffix(".enc")) {
                    out.push(hash.to_string());
                }
            }
        }
        Ok(out)
    }

    /// File age in seconds since modification, used by the compression
    /// sweep; `None` if the file doesn't exist or its metadata is
    /// unreadable.
    pub fn age_secs(&self, content_hash: &str, now: chrono::DateTime<chrono::Utc>) -> Option<i64> {
        let path = self.path_for(content_hash);
        let meta = fs::metadata(&path).ok()?;
        let modified: chrono::DateTime<chrono::Utc> = meta.modified().ok()?.into();
        Some((now - modified).num_seconds())
    }

    /// Copy an external file into this store's directory verbatim, keyed by
    /// `content_hash`, compressed or not according to `src`'s own extension
    /// — the counterpart to [`Self::copy_raw_to`], used by import to
    /// restore an off-chain bundle without touching its ciphertext.
    pub fn adopt_raw_from(&self, src: &Path, content_hash: &str) -> Result<(), OffChainError> {
        let dest = if src.extension().and_then(|e| e.to_str()) == Some("gz") {
            self.compressed_path_for(content_hash)
        } else {
            self.path_for(content_hash)
        };
        fs::copy(src, dest)?;
        Ok(())
    }

    /// Copy the on-disk object for `content_hash` (compressed or not, as
    /// stored) into `dest_dir`, unchanged — used by export to bundle
    /// off-chain payloads without decrypting them. `dest_dir` must already
    /// exist.
    pub fn copy_raw_to(&self, content_hash: &str, dest_dir: &Path) -> Result<(), OffChainError> {
        let plain_path = self.path_for(content_hash);
        if plain_path.exists() {
            fs::copy(&plain_path, dest_dir.join(format!("{content_hash}.enc")))?;
            return Ok(());
        }
        let gz_path = self.compressed_path_for(content_hash);
        if gz_path.exists() {
            fs::copy(&gz_path, dest_dir.join(format!("{content_hash}.enc.gz")))?;
            return Ok(());
        }
        Err(OffChainError::NotFound(content_hash.to_string()))
    }

    pub fn delete(&self, content_hash: &str) -> Result<(), OffChainError> {
        let plain_path = self.path_for(content_hash);
        if plain_path.exists() {
            fs::remove_file(plain_path)?;
        }
        let gz_path = self.compressed_path_for(content_hash);
        if gz_path.exists() {
            fs::remove_file(gz_path)?;
        }
        Ok(())
    }

    /// Remove every object in the store, compressed or not. Used by a full
    /// ledger reset (spec §4.8's `clear_and_reinitialize`), which must leave
    /// no off-chain file referring to a now-deleted chain behind.
    pub fn clear_all(&self) -> Result<(), OffChainError> {
        for hash in self.list_content_hashes()? {
            self.delete(&hash)?;
        }
        Ok(())
    }
}

/// Pure function: given the live on-chain reference set and the directory
/// listing, return orphaned content hashes (no referring block). Consumed
/// by `MaintenanceScheduler`'s cleanup task (§4.13).
pub fn find_orphans(live: &std::collections::HashSet<String>, on_disk: &[String]) -> Vec<String> {
    on_disk
        .iter()
        .filter(|hash| !live.contains(*hash))
        .cloned()
        .collect()
}
