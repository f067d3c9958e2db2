//! Persistent storage, backed by `sled` (pure-Rust, no C/LLVM dependency —
//! the same reasoning the ancestor workspace's `chronx-state::db` gives for
//! choosing it).
//!
//! Named trees, matching the persisted-state layout in spec §6:
//!
//!   blocks            — block_number (big-endian u64) → bincode(Block)
//!   authorized_keys   — public_key bytes              → bincode(AuthorizedKeyRecord)
//!   block_sequence    — single row, "next" key         → big-endian u64 counter
//!   off_chain_index   — content_hash hex bytes         → bincode(OffChainIndexEntry)

use std::path::Path;

use chainvault_core::{AuthorizedKeyRecord, Block, BlockNumber, IoError};
use serde::{Deserialize, Serialize};

fn storage_err(e: impl std::fmt::Display) -> IoError {
    IoError::Storage(e.to_string())
}

/// Tracks which block currently references a given off-chain content hash,
/// so `MaintenanceScheduler`'s cleanup task can identify orphans (spec §4.5,
/// §4.13).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OffChainIndexEntry {
    pub content_hash: String,
    pub referring_block: BlockNumber,
}

#[derive(Clone)]
pub struct LedgerDb {
    db: sled::Db,
    blocks: sled::Tree,
    authorized_keys: sled::Tree,
    sequence: sled::Tree,
    off_chain_index: sled::Tree,
}

const SEQUENCE_KEY: &[u8] = b"next_block_number";

impl LedgerDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        let db = sled::open(path).map_err(storage_err)?;
        let blocks = db.open_tree("blocks").map_err(storage_err)?;
        let authorized_keys = db.open_tree("authorized_keys").map_err(storage_err)?;
        let sequence = db.open_tree("block_sequence").map_err(storage_err)?;
        let off_chain_index = db.open_tree("off_chain_index").map_err(storage_err)?;
        Ok(Self {
            db,
            blocks,
            authorized_keys,
            sequence,
            off_chain_index,
        })
    }

    // ── Blocks ───────────────────────────────────────────────────────────────

    fn block_key(n: BlockNumber) -> [u8; 8] {
        n.to_be_bytes()
    }

    pub fn get_block(&self, n: BlockNumber) -> Result<Option<Block>, IoError> {
        match self.blocks.get(Self::block_key(n)).map_err(storage_err)? {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes).map_err(|e| IoError::Storage(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub fn block_count(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// Current chain head (highest block number present), if any.
    pub fn head_block_number(&self) -> Result<Option<BlockNumber>, IoError> {
        match self.blocks.last().map_err(storage_err)? {
            Some((key, _)) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&key);
                Ok(Some(BlockNumber::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    /// The block number that would be assigned to the next append, without
    /// reserving it. Used by `ChainEngine::append` to build the canonical
    /// pre-image (which requires signing, a fallible operation) before
    /// entering the atomic insert.
    pub fn peek_next_block_number(&self) -> Result<BlockNumber, IoError> {
        match self.sequence.get(SEQUENCE_KEY).map_err(storage_err)? {
            Some(bytes) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes);
                Ok(BlockNumber::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }

    /// The current head block's hash, or the zero digest if the chain is
    /// empty (genesis's `previous_hash`).
    pub fn head_hash(&self) -> Result<chainvault_core::BlockHash, IoError> {
        match self.head_block_number()? {
            Some(n) => Ok(self
                .get_block(n)?
                .map(|b| b.hash)
                .unwrap_or_else(chainvault_core::BlockHash::zero)),
            None => Ok(chainvault_core::BlockHash::zero()),
        }
    }

    /// Insert a fully-built `block` whose `block_number` was computed from
    /// [`peek_next_block_number`], failing if the counter moved in the
    /// meantime (it cannot, under the process-wide write lock, but the
    /// check keeps the invariant enforced at the storage boundary too).
    pub fn insert_block_with_expected_number(&self, expected: BlockNumber, block: Block) -> Result<Block, IoError> {
        use sled::transaction::{ConflictableTransactionError, Transactional};

        let result = (&self.blocks, &self.sequence).transaction(|(blocks, sequence)| {
            let next = match sequence.get(SEQUENCE_KEY)? {
                Some(bytes) => {
                    let mut arr = [0u8; 8];
                    arr.copy_from_slice(&bytes);
                    BlockNumber::from_be_bytes(arr)
                }
                None => 0,
            };
            if next != expected {
                return Err(ConflictableTransactionError::Abort(IoError::Storage(format!(
                    "block number race: expected {expected}, counter at {next}"
                ))));
            }
            let encoded = bincode::serialize(&block)
                .map_err(|e| ConflictableTransactionError::Abort(IoError::Storage(e.to_string())))?;
            blocks.insert(&expected.to_be_bytes(), encoded)?;
            sequence.insert(SEQUENCE_KEY, &(expected + 1).to_be_bytes())?;
            Ok(())
        });

        result.map_err(|e| match e {
            sled::transaction::TransactionError::Abort(io) => io,
            sled::transaction::TransactionError::Storage(e) => storage_err(e),
        })?;
        Ok(block)
    }

    /// Allocate the next block number and persist `block` atomically: either
    /// both succeed or neither does (Invariant applying to §4.8 step 6/10).
    pub fn allocate_and_insert_block(&self, build: impl FnOnce(BlockNumber) -> Block) -> Result<Block, IoError> {
        use sled::transaction::{ConflictableTransactionError, Transactional};

        let result = (&self.blocks, &self.sequence).transaction(|(blocks, sequence)| {
            let next = match sequence.get(SEQUENCE_KEY)? {
                Some(bytes) => {
                    let mut arr = [0u8; 8];
                    arr.copy_from_slice(&bytes);
                    BlockNumber::from_be_bytes(arr)
                }
                None => 0,
            };
            let block = build(next);
            let encoded = bincode::serialize(&block)
                .map_err(|e| ConflictableTransactionError::Abort(IoError::Storage(e.to_string())))?;
            blocks.insert(&next.to_be_bytes(), encoded)?;
            sequence.insert(SEQUENCE_KEY, &(next + 1).to_be_bytes())?;
            Ok(block)
        });

        result.map_err(|e| match e {
            sled::transaction::TransactionError::Abort(io) => io,
            sled::transaction::TransactionError::Storage(e) => storage_err(e),
        })
    }

    /// Delete all blocks with `block_number > target`, and reset the
    /// sequence counter to `target + 1`, atomically. Used by `rollback`.
    pub fn truncate_after(&self, target: BlockNumber) -> Result<Vec<Block>, IoError> {
        use sled::transaction::Transactional;

        // Collect candidates outside the transaction (sled transactions
        // don't support range scans); re-check existence inside.
        let mut to_delete = Vec::new();
        for item in self.blocks.iter() {
            let (key, value) = item.map_err(storage_err)?;
            let mut arr = [0u8; 8];
            arr.copy_from_slice(&key);
            let n = BlockNumber::from_be_bytes(arr);
            if n > target {
                let block: Block =
                    bincode::deserialize(&value).map_err(|e| IoError::Storage(e.to_string()))?;
                to_delete.push((n, block));
            }
        }
        to_delete.sort_by(|a, b| b.0.cmp(&a.0));

        let removed = (&self.blocks, &self.sequence).transaction(|(blocks, sequence)| {
            for (n, _) in &to_delete {
                blocks.remove(&n.to_be_bytes())?;
            }
            sequence.insert(SEQUENCE_KEY, &(target + 1).to_be_bytes())?;
            Ok(())
        });
        removed.map_err(|e: sled::transaction::TransactionError<IoError>| match e {
            sled::transaction::TransactionError::Abort(io) => io,
            sled::transaction::TransactionError::Storage(e) => storage_err(e),
        })?;

        Ok(to_delete.into_iter().map(|(_, b)| b).collect())
    }

    /// Persist a block whose fields changed in place (retroactive
    /// encryption only — never used to mutate the hashable fields).
    pub fn put_block(&self, block: &Block) -> Result<(), IoError> {
        let encoded = bincode::serialize(block).map_err(|e| IoError::Storage(e.to_string()))?;
        self.blocks
            .insert(Self::block_key(block.block_number), encoded)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_blocks(&self) -> impl Iterator<Item = Result<Block, IoError>> + '_ {
        self.blocks.iter().map(|item| {
            let (_, bytes) = item.map_err(storage_err)?;
            bincode::deserialize(&bytes).map_err(|e| IoError::Storage(e.to_string()))
        })
    }

    // ── Authorized keys ──────────────────────────────────────────────────────

    pub fn insert_authorized_key(&self, record: &AuthorizedKeyRecord) -> Result<(), IoError> {
        let encoded = bincode::serialize(record).map_err(|e| IoError::Storage(e.to_string()))?;
        self.authorized_keys
            .insert(&record.public_key.0, encoded)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn find_by_public_key(&self, public_key: &[u8]) -> Result<Option<AuthorizedKeyRecord>, IoError> {
        match self.authorized_keys.get(public_key).map_err(storage_err)? {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes).map_err(|e| IoError::Storage(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub fn find_by_owner_name(&self, owner_name: &str) -> Result<Option<AuthorizedKeyRecord>, IoError> {
        for item in self.authorized_keys.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let record: AuthorizedKeyRecord =
                bincode::deserialize(&bytes).map_err(|e| IoError::Storage(e.to_string()))?;
            if record.owner_name == owner_name {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    pub fn list_active(&self) -> Result<Vec<AuthorizedKeyRecord>, IoError> {
        let mut out = Vec::new();
        for item in self.authorized_keys.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let record: AuthorizedKeyRecord =
                bincode::deserialize(&bytes).map_err(|e| IoError::Storage(e.to_string()))?;
            if record.is_active {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Every authorized-key record, active or revoked — used by export,
    /// where `list_active` would silently drop revocation history.
    pub fn list_all_authorized_keys(&self) -> Result<Vec<AuthorizedKeyRecord>, IoError> {
        let mut out = Vec::new();
        for item in self.authorized_keys.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(|e| IoError::Storage(e.to_string()))?);
        }
        Ok(out)
    }

    pub fn count_authorized_keys(&self) -> u64 {
        self.authorized_keys.len() as u64
    }

    pub fn delete_authorized_key(&self, public_key: &[u8]) -> Result<(), IoError> {
        self.authorized_keys.remove(public_key).map_err(storage_err)?;
        Ok(())
    }

    // ── Off-chain index ──────────────────────────────────────────────────────

    pub fn put_off_chain_index(&self, entry: &OffChainIndexEntry) -> Result<(), IoError> {
        let encoded = bincode::serialize(entry).map_err(|e| IoError::Storage(e.to_string()))?;
        self.off_chain_index
            .insert(entry.content_hash.as_bytes(), encoded)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn remove_off_chain_index(&self, content_hash: &str) -> Result<(), IoError> {
        self.off_chain_index
            .remove(content_hash.as_bytes())
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn live_off_chain_hashes(&self) -> Result<std::collections::HashSet<String>, IoError> {
        let mut out = std::collections::HashSet::new();
        for item in self.off_chain_index.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let entry: OffChainIndexEntry =
                bincode::deserialize(&bytes).map_err(|e| IoError::Storage(e.to_string()))?;
            out.insert(entry.content_hash);
        }
        Ok(out)
    }

    // ── Destructive reset ────────────────────────────────────────────────────

    /// Truncate every table. Used only by `clearAndReinitialize` (spec §4.8).
    pub fn clear_all(&self) -> Result<(), IoError> {
        self.blocks.clear().map_err(storage_err)?;
        self.authorized_keys.clear().map_err(storage_err)?;
        self.sequence.clear().map_err(storage_err)?;
        self.off_chain_index.clear().map_err(storage_err)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), IoError> {
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }

    /// Approximate on-disk size in bytes, for the maintenance size monitor.
    pub fn size_on_disk(&self) -> Result<u64, IoError> {
        self.db.size_on_disk().map_err(storage_err)
    }
}
