//! `export_chain`/`import_chain` (spec §4.12): canonical on-disk snapshot
//! plus an optional off-chain bundle, fail-fast and transactional on
//! import.

use std::fs;
use std::path::Path;

use chainvault_core::{
    Block, BlockHash, BlockNumber, EXPORT_SCHEMA_VERSION,
};
use chainvault_offchain::OffChainStore;
use chainvault_storage::LedgerDb;
use tracing::{info, warn};

use crate::error::{ExportError, ImportError};
use crate::path_safety::{reject_parent_traversal, require_json_extension, require_within_root};
use crate::snapshot::{ExportedBlock, ExportedKey, ExportSnapshot};

const OFF_CHAIN_BUNDLE_SUFFIX: &str = ".offchain";

fn bundle_dir_for(dest_path: &Path) -> std::path::PathBuf {
    let stem = dest_path.file_stem().unwrap_or_default().to_string_lossy().into_owned();
    dest_path.with_file_name(format!("{stem}{OFF_CHAIN_BUNDLE_SUFFIX}"))
}

/// Writes a schema-versioned snapshot of `db` to `dest_path`. If `offchain`
/// is given, every off-chain content hash referenced by a block is copied
/// (ciphertext unchanged) into a sibling `<stem>.offchain/` directory and
/// named in the snapshot's manifest.
pub fn export_chain(
    db: &LedgerDb,
    offchain: Option<&OffChainStore>,
    dest_path: &Path,
    allowed_root: &Path,
) -> Result<(), ExportError> {
    require_json_extension(dest_path)?;
    reject_parent_traversal(dest_path)?;

    let parent = dest_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    require_within_root(parent, allowed_root)?;

    let mut blocks: Vec<ExportedBlock> = Vec::new();
    for item in db.iter_blocks() {
        blocks.push(ExportedBlock::from_block(&item?));
    }
    blocks.sort_by_key(|b| b.block_number);

    let authorized_keys = db
        .list_all_authorized_keys()?
        .iter()
        .map(ExportedKey::from_record)
        .collect();

    let off_chain_manifest = if let Some(store) = offchain {
        let mut hashes = Vec::new();
        let bundle_dir = bundle_dir_for(dest_path);
        fs::create_dir_all(&bundle_dir)?;
        for block in &blocks {
            if let Some(reference) = &block.off_chain_reference {
                store.copy_raw_to(&reference.content_hash, &bundle_dir)?;
                hashes.push(reference.content_hash.clone());
            }
        }
        Some(hashes)
    } else {
        None
    };

    let snapshot = ExportSnapshot {
        schema_version: EXPORT_SCHEMA_VERSION,
        blocks,
        authorized_keys,
        off_chain_manifest,
    };

    let json = serde_json::to_vec_pretty(&snapshot).map_err(|e| ExportError::Serde(e.to_string()))?;
    fs::write(dest_path, json)?;
    info!(
        path = %dest_path.display(),
        blocks = snapshot.blocks.len(),
        keys = snapshot.authorized_keys.len(),
        "chain exported"
    );
    Ok(())
}

/// Replays a snapshot into an empty chain. Every block's hash and signature
/// is recomputed and reverified before insertion; the first mismatch aborts
/// with [`ImportError::Integrity`] and nothing already staged is committed
/// (blocks accumulate in memory and are only inserted once the whole
/// snapshot has passed verification, so a mid-stream failure leaves storage
/// untouched).
pub fn import_chain(
    db: &LedgerDb,
    offchain: Option<&OffChainStore>,
    src_path: &Path,
    allowed_root: &Path,
) -> Result<(), ImportError> {
    require_json_extension(src_path)?;
    reject_parent_traversal(src_path)?;
    let parent = src_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    require_within_root(parent, allowed_root)?;

    if db.block_count() != 0 || db.count_authorized_keys() != 0 {
        return Err(ImportError::NotEmpty);
    }

    let contents = fs::read(src_path)?;
    let snapshot: ExportSnapshot =
        serde_json::from_slice(&contents).map_err(|e| ImportError::Serde(e.to_string()))?;

    if snapshot.schema_version != EXPORT_SCHEMA_VERSION {
        return Err(ImportError::UnsupportedSchema(snapshot.schema_version));
    }

    let mut blocks: Vec<Block> = snapshot
        .blocks
        .into_iter()
        .map(ExportedBlock::into_block)
        .collect::<Result<_, _>>()?;
    blocks.sort_by_key(|b| b.block_number);

    let mut expected_previous = BlockHash::zero();
    for block in &blocks {
        verify_block_integrity(block, &expected_previous)?;
        expected_previous = block.hash;
    }

    for block in blocks {
        let expected = block.block_number;
        db.insert_block_with_expected_number(expected, block)?;
    }

    for key in snapshot.authorized_keys {
        db.insert_authorized_key(&key.into_record()?)?;
    }

    if let (Some(store), Some(manifest)) = (offchain, &snapshot.off_chain_manifest) {
        let bundle_dir = bundle_dir_for(src_path);
        for content_hash in manifest {
            let plain = bundle_dir.join(format!("{content_hash}.enc"));
            let gz = bundle_dir.join(format!("{content_hash}.enc.gz"));
            let src = if plain.exists() {
                plain
            } else if gz.exists() {
                gz
            } else {
                warn!(content_hash, "off-chain manifest entry missing from bundle directory");
                continue;
            };
            store.adopt_raw_from(&src, content_hash)?;
        }
    }

    info!(path = %src_path.display(), "chain imported");
    Ok(())
}

fn verify_block_integrity(block: &Block, expected_previous: &BlockHash) -> Result<(), ImportError> {
    let preimage = block.preimage();
    let recomputed = chainvault_crypto::block_hash(&preimage);
    if recomputed != block.hash {
        return Err(ImportError::Integrity(block.block_number));
    }
    if &block.previous_hash != expected_previous {
        return Err(ImportError::Integrity(block.block_number));
    }
    if chainvault_crypto::signature::verify(&block.signer_public_key, &preimage, &block.signature).is_err() {
        return Err(ImportError::Integrity(block.block_number));
    }
    Ok(())
}
