//! `ChainEngine` (spec §4.8): the append path plus bootstrap, rollback,
//! retroactive encryption, and destructive reset.
//!
//! The append path stages everything fallible — off-chain I/O, DEK
//! generation, encryption — *before* taking the write lock, then enters the
//! lock only to read the current head, assign the block number, sign, and
//! persist (mirroring the ancestor workspace's `StateEngine::apply`
//! staged-mutation-then-commit shape, `chronx-state::engine`).

use chainvault_core::{
    AuthorizedKeyRecord, Block, BlockHash, BlockNumber, CryptoError, IntegrityError, OffChainReference,
    PublicKeyBytes, Role, SecurityError, StateError, Timestamp, ValidationError, MAX_OWNER_NAME_LEN,
    MAX_PAYLOAD_BYTES, OFF_CHAIN_THRESHOLD_BYTES,
};
use chainvault_crypto::{envelope, signature, SecretKey};
use chainvault_offchain::OffChainStore;
use chainvault_rbac::{policy, AuthorizedKeyRepository, Operation};
use chainvault_storage::LedgerDb;
use tracing::{info, warn};

use crate::error::ChainError;
use crate::lock::ConcurrencyControl;

/// How `append` should handle the payload's confidentiality. Retroactive
/// encryption is a distinct operation ([`ChainEngine::encrypt_existing_block`])
/// with its own, deliberately different strategy — see that method's docs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncryptionRequest {
    /// Store the payload inline/off-chain unencrypted.
    None,
    /// Encrypt with the BMEK at creation time; the ciphertext envelope
    /// becomes the block's `data` (this implementation's chosen strategy
    /// for the Open Question in spec §4.8 step 7 — see DESIGN.md).
    Bmek,
}

pub struct ChainEngine {
    db: LedgerDb,
    offchain: OffChainStore,
    lock: ConcurrencyControl,
}

impl ChainEngine {
    pub fn new(db: LedgerDb, offchain: OffChainStore) -> Self {
        Self {
            db,
            offchain,
            lock: ConcurrencyControl::new(),
        }
    }

    pub fn db(&self) -> &LedgerDb {
        &self.db
    }

    pub fn lock(&self) -> &ConcurrencyControl {
        &self.lock
    }

    fn repository(&self) -> AuthorizedKeyRepository<'_> {
        AuthorizedKeyRepository::new(&self.db)
    }

    // ── Bootstrap ────────────────────────────────────────────────────────────

    /// The sole operation permitted with no prior state (spec §4.8).
    /// Registers the first `SUPER_ADMIN` principal and emits the genesis
    /// block, signed by that principal's key. Idempotent only when the
    /// exact same owner name and public key reproduce the existing
    /// bootstrap row; any other call once state exists fails with
    /// `SecurityError::BootstrapViolation`.
    pub fn create_bootstrap_admin(
        &self,
        bootstrap: &chainvault_crypto::KeyPair,
        owner_name: String,
        now: Timestamp,
    ) -> Result<(AuthorizedKeyRecord, Block), ChainError> {
        if owner_name.len() > MAX_OWNER_NAME_LEN {
            return Err(ValidationError::OwnerNameTooLong { max: MAX_OWNER_NAME_LEN }.into());
        }

        self.lock.with_write(|| -> Result<(AuthorizedKeyRecord, Block), ChainError> {
            let repo = self.repository();

            if !repo.is_empty() {
                let existing = repo.find_by_public_key(&bootstrap.public_key.0)?;
                match existing {
                    Some(record) if record.owner_name == owner_name && record.role == Role::SuperAdmin => {
                        let genesis = self
                            .db
                            .get_block(0)?
                            .ok_or(ChainError::BlockNotFound(0))?;
                        Ok((record, genesis))
                    }
                    _ => Err(SecurityError::BootstrapViolation.into()),
                }
            } else {
                let record = AuthorizedKeyRecord::bootstrap(bootstrap.public_key.clone(), owner_name, now);
                repo.insert(record.clone())?;
                let genesis = self.emit_genesis(bootstrap, now)?;
                info!(owner = %record.owner_name, "bootstrap admin created, genesis block emitted");
                Ok((record, genesis))
            }
        })
    }

    fn emit_genesis(&self, signer: &chainvault_crypto::KeyPair, now: Timestamp) -> Result<Block, ChainError> {
        let data = "GENESIS".to_string();
        let block_number = self.db.peek_next_block_number()?;
        let previous_hash = BlockHash::zero();
        let preimage = Block::canonical_preimage(block_number, now, &previous_hash, &data, &signer.public_key);
        let hash = chainvault_crypto::block_hash(&preimage);
        let signature_bytes = signer.sign(&preimage)?;

        let block = Block {
            block_number,
            timestamp: now,
            previous_hash,
            data,
            signer_public_key: signer.public_key.clone(),
            signature: signature_bytes,
            hash,
            is_encrypted: false,
            encryption_metadata: None,
            off_chain_reference: None,
            manual_keywords: None,
            auto_keywords: None,
        };
        Ok(self.db.insert_block_with_expected_number(block_number, block)?)
    }

    // ── Append ───────────────────────────────────────────────────────────────

    /// The write path (spec §4.8 steps 1-12).
    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &self,
        caller: &chainvault_crypto::KeyPair,
        payload: &[u8],
        content_type: Option<&str>,
        encryption: EncryptionRequest,
        bmek: Option<&SecretKey>,
        manual_keywords: Option<String>,
        now: Timestamp,
    ) -> Result<Block, ChainError> {
        // 1-2: caller identification + authorization
        let repo = self.repository();
        let caller_record = repo
            .find_by_public_key(&caller.public_key.0)?
            .ok_or(SecurityError::Authentication)?;
        if !caller_record.is_active {
            return Err(SecurityError::Authentication.into());
        }
        policy::authorize(caller_record.role, caller_record.role, Operation::Append)?;

        // 3: input validation
        if payload.is_empty() {
            return Err(ValidationError::EmptyPayload.into());
        }
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(ValidationError::PayloadTooLarge {
                got: payload.len(),
                max: MAX_PAYLOAD_BYTES,
            }
            .into());
        }

        // 5: size routing (staged before the write lock — no I/O held across it)
        let mut off_chain_reference: Option<OffChainReference> = None;
        let mut data = if payload.len() >= OFF_CHAIN_THRESHOLD_BYTES {
            let bmek_key = bmek.ok_or(StateError::BmekMissing)?;
            let reference = self
                .offchain
                .put(payload, content_type.unwrap_or("application/octet-stream"), bmek_key)?;
            let json = serde_json::to_string(&reference)
                .map_err(|e| ChainError::from(chainvault_core::IoError::Storage(e.to_string())))?;
            off_chain_reference = Some(reference);
            json
        } else {
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, payload)
        };

        // 7: encryption (staged before the write lock)
        let is_encrypted = matches!(encryption, EncryptionRequest::Bmek);
        if is_encrypted {
            let bmek_key = bmek.ok_or(StateError::BmekMissing)?;
            data = envelope::encrypt(data.as_bytes(), bmek_key)?;
        }

        let signer_public_key = caller.public_key.clone();
        let secret_key_bytes = caller.secret_key_bytes().to_vec();

        // 4, 6, 8-11: acquire write lock, assign number, hash, sign, persist
        self.lock.with_write(|| -> Result<Block, ChainError> {
            let previous_hash = self.db.head_hash()?;
            let block_number = self.db.peek_next_block_number()?;

            let preimage = Block::canonical_preimage(block_number, now, &previous_hash, &data, &signer_public_key);
            let hash = chainvault_crypto::block_hash(&preimage);
            let signature_bytes = signature::sign(&secret_key_bytes, &preimage)?;

            let block = Block {
                block_number,
                timestamp: now,
                previous_hash,
                data,
                signer_public_key,
                signature: signature_bytes,
                hash,
                is_encrypted,
                encryption_metadata: None,
                off_chain_reference,
                manual_keywords,
                auto_keywords: None,
            };
            let block = self.db.insert_block_with_expected_number(block_number, block)?;
            info!(block_number, "block appended");
            Ok(block)
        })
        // 12: enqueueing the index update is the facade's job — it owns the
        // `IndexingCoordinator` and calls it after this returns.
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn get_block(&self, n: BlockNumber) -> Result<Option<Block>, ChainError> {
        Ok(self.lock.read_optimistic_or_fallback(|| self.db.get_block(n))?)
    }

    pub fn is_key_authorized(&self, public_key: &PublicKeyBytes) -> Result<bool, ChainError> {
        let found = self
            .lock
            .read_optimistic_or_fallback(|| self.repository().find_by_public_key(&public_key.0))?;
        Ok(found.map(|r| r.is_active).unwrap_or(false))
    }

    pub fn block_count(&self) -> u64 {
        self.lock.read_optimistic_or_fallback(|| self.db.block_count())
    }

    pub fn offchain(&self) -> &OffChainStore {
        &self.offchain
    }

    /// Decrypt a block's payload, following its recorded encryption
    /// strategy: ciphertext-in-`data` (fresh BMEK encryption) or
    /// plaintext-`data`-plus-`encryption_metadata` (retroactive). Branches on
    /// the envelope version (spec §4.4) so a legacy `GCM-v1.0` block, wrapped
    /// with its signer's own key rather than the BMEK, still decrypts.
    pub fn retrieve_decrypted(&self, block: &Block, bmek: &SecretKey) -> Result<Vec<u8>, ChainError> {
        if let Some(reference) = &block.off_chain_reference {
            return Ok(self.offchain.get(reference, bmek)?);
        }
        if block.is_encrypted {
            if let Some(metadata) = &block.encryption_metadata {
                // Retroactive: plaintext lives in `data`, ciphertext in metadata;
                // metadata is authoritative for "encrypted" reads.
                return Ok(envelope::decrypt_for_signer(metadata, &block.signer_public_key, bmek)?);
            }
            // Fresh BMEK encryption: ciphertext lives in `data` itself.
            return Ok(envelope::decrypt_for_signer(&block.data, &block.signer_public_key, bmek)?);
        }
        Ok(base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &block.data)
            .map_err(|_| ChainError::from(CryptoError::Authentication))?)
    }

    // ── Rollback ─────────────────────────────────────────────────────────────

    /// Deletes blocks strictly greater than `to_block_number`, descending,
    /// within one transaction, decrementing the counter. Off-chain files
    /// referenced only by deleted blocks become orphans, swept later by
    /// `MaintenanceScheduler` (spec §4.8, §4.13).
    pub fn rollback(
        &self,
        caller_role: Role,
        to_block_number: BlockNumber,
        now_head: BlockNumber,
    ) -> Result<Vec<Block>, ChainError> {
        let depth = now_head.saturating_sub(to_block_number);
        if !policy::can_rollback(caller_role, depth) {
            return Err(SecurityError::PermissionDenied {
                caller_role,
                target_role: caller_role,
                op: Operation::Rollback.to_string(),
            }
            .into());
        }
        self.lock
            .with_write(|| -> Result<Vec<Block>, ChainError> { Ok(self.db.truncate_after(to_block_number)?) })
    }

    // ── Retroactive encryption ───────────────────────────────────────────────

    /// Encrypts an existing block's payload in place, WITHOUT touching
    /// `data`, `hash`, `signature`, `previous_hash`, `block_number`, or
    /// `timestamp` (Invariant BL-1). The plaintext `data` is retained and
    /// `encryption_metadata` receives the ciphertext envelope — the
    /// "retain-plaintext-and-wrap" strategy this implementation always uses
    /// for this path (see DESIGN.md's Open Question note; contrast with
    /// `append`'s ciphertext-in-`data` strategy for fresh encryption).
    pub fn encrypt_existing_block(&self, block_number: BlockNumber, bmek: &SecretKey) -> Result<Block, ChainError> {
        self.lock.with_write(|| -> Result<Block, ChainError> {
            let mut block = self
                .db
                .get_block(block_number)?
                .ok_or(ChainError::BlockNotFound(block_number))?;

            if block.is_encrypted {
                return Ok(block);
            }

            let ciphertext = envelope::encrypt(block.data.as_bytes(), bmek)?;
            block.encryption_metadata = Some(ciphertext);
            block.is_encrypted = true;
            self.db.put_block(&block)?;
            info!(block_number, "block retroactively encrypted");
            Ok(block)
        })
    }

    // ── Destructive reset ────────────────────────────────────────────────────

    /// Truncates all tables, removes search indexes, deletes every off-chain
    /// object, resets the block counter, and emits a fresh genesis block
    /// (spec §4.8: a full reset leaves no orphaned off-chain file behind).
    pub fn clear_and_reinitialize(
        &self,
        bootstrap: &chainvault_crypto::KeyPair,
        owner_name: String,
        now: Timestamp,
    ) -> Result<(AuthorizedKeyRecord, Block), ChainError> {
        self.lock.with_write(|| -> Result<(), ChainError> {
            self.db.clear_all()?;
            self.offchain.clear_all()?;
            Ok(())
        })?;
        warn!("chain cleared and reinitialized");
        self.create_bootstrap_admin(bootstrap, owner_name, now)
    }

    /// Re-verify an on-disk integrity claim against the current hash/sign
    /// relationship for one block — used by `ChainValidator` and by import.
    pub fn recompute_hash_and_verify(&self, block: &Block) -> Result<(), ChainError> {
        let preimage = block.preimage();
        let recomputed = chainvault_crypto::block_hash(&preimage);
        if recomputed != block.hash {
            return Err(IntegrityError::HashMismatch(block.block_number).into());
        }
        signature::verify(&block.signer_public_key, &preimage, &block.signature)
            .map_err(|_| IntegrityError::SignatureMismatch(block.block_number))?;
        Ok(())
    }
}
