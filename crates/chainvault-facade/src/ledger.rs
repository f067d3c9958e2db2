//! `Ledger` (spec §2 row 14, §6): the single entry point an embedder
//! constructs and drives. Pure orchestration over components 1-13 — no
//! business logic lives here that isn't already implemented in the crates
//! it wires together.

use std::path::Path;
use std::sync::Mutex;

use chainvault_chain::{ChainEngine, ChainValidator, EncryptionRequest, ValidationReport};
use chainvault_core::{
    AuthorizedKeyRecord, Block, BlockNumber, PublicKeyBytes, Role, SecurityError, Timestamp,
    ValidationError, MAX_OWNER_NAME_LEN,
};
use chainvault_crypto::KeyPair;
use chainvault_index::{IndexingCoordinator, IndexingRequest};
use chainvault_keys::BmekManager;
use chainvault_maintenance::MaintenanceScheduler;
use chainvault_offchain::OffChainStore;
use chainvault_rbac::{authorize, AuthorizedKeyRepository, Operation};
use chainvault_storage::LedgerDb;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::LedgerConfig;
use crate::error::LedgerError;

pub struct Ledger {
    engine: ChainEngine,
    bmek: BmekManager,
    indexing: IndexingCoordinator,
    maintenance: Mutex<Option<MaintenanceScheduler>>,
    config: LedgerConfig,
}

impl Ledger {
    /// Opens (or creates) a ledger rooted at `config.data_dir`/`key_dir`/
    /// `off_chain_dir`. Does not itself create any principal or genesis
    /// block — call [`Self::create_bootstrap_admin`] on a fresh store.
    pub fn open(config: LedgerConfig) -> Result<Self, LedgerError> {
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(&config.key_dir)?;

        let db = LedgerDb::open(config.data_dir.join("db"))?;
        let offchain = OffChainStore::new(&config.off_chain_dir)?;
        let bmek = BmekManager::new(&config.key_dir);
        bmek.initialize()?;

        Ok(Self {
            engine: ChainEngine::new(db, offchain),
            bmek,
            indexing: IndexingCoordinator::new(),
            maintenance: Mutex::new(None),
            config,
        })
    }

    /// Like [`Self::open`], but index updates run synchronously on the
    /// caller instead of via `tokio::spawn`, so integration tests can assert
    /// on indexing side effects without a runtime.
    pub fn open_for_tests(config: LedgerConfig) -> Result<Self, LedgerError> {
        let ledger = Self::open(config)?;
        ledger.indexing.set_test_mode(true);
        Ok(ledger)
    }

    fn repository(&self) -> AuthorizedKeyRepository<'_> {
        AuthorizedKeyRepository::new(self.engine.db())
    }

    fn active_caller(&self, caller: &KeyPair) -> Result<AuthorizedKeyRecord, LedgerError> {
        self.repository()
            .find_by_public_key(&caller.public_key.0)?
            .filter(|r| r.is_active)
            .ok_or_else(|| SecurityError::Authentication.into())
    }

    // ── Bootstrap & principal management ──────────────────────────────────

    pub fn create_bootstrap_admin(
        &self,
        bootstrap: &KeyPair,
        owner_name: String,
        now: Timestamp,
    ) -> Result<(AuthorizedKeyRecord, Block), LedgerError> {
        Ok(self.engine.create_bootstrap_admin(bootstrap, owner_name, now)?)
    }

    /// Registers a new principal. `caller` must be active and the RBAC
    /// creation matrix must allow `caller`'s role to mint `role` (spec §4.7).
    pub fn create_authorized_key(
        &self,
        caller: &KeyPair,
        new_public_key: PublicKeyBytes,
        owner_name: String,
        role: Role,
        now: Timestamp,
    ) -> Result<AuthorizedKeyRecord, LedgerError> {
        if owner_name.len() > MAX_OWNER_NAME_LEN {
            return Err(ValidationError::OwnerNameTooLong { max: MAX_OWNER_NAME_LEN }.into());
        }

        self.engine.lock().with_write(|| -> Result<AuthorizedKeyRecord, LedgerError> {
            let caller_record = self.active_caller(caller)?;
            authorize(caller_record.role, role, Operation::CreateKey)?;

            let repo = self.repository();
            let record = AuthorizedKeyRecord {
                public_key: new_public_key,
                owner_name,
                role,
                is_active: true,
                created_at: now,
                revoked_at: None,
                created_by: Some(caller_record.owner_name.clone()),
            };
            repo.insert(record.clone())?;
            info!(owner = %record.owner_name, role = %record.role, created_by = %caller_record.owner_name, "authorized key created");
            Ok(record)
        })
    }

    /// Revokes a principal. Subject to Invariant AK-1 (last-super-admin
    /// protection), enforced by `AuthorizedKeyRepository::deactivate`.
    pub fn revoke_authorized_key(
        &self,
        caller: &KeyPair,
        target_public_key: &PublicKeyBytes,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        self.engine.lock().with_write(|| -> Result<(), LedgerError> {
            let caller_record = self.active_caller(caller)?;
            let repo = self.repository();
            let target_record = repo
                .find_by_public_key(&target_public_key.0)?
                .ok_or(chainvault_rbac::RepositoryError::NotFound)?;
            authorize(caller_record.role, target_record.role, Operation::Revoke)?;
            repo.deactivate(&target_public_key.0, now)?;
            warn!(owner = %target_record.owner_name, revoked_by = %caller_record.owner_name, "authorized key revoked");
            Ok(())
        })
    }

    // ── Append ───────────────────────────────────────────────────────────────

    pub fn append_block(
        &self,
        caller: &KeyPair,
        payload: &[u8],
        content_type: Option<&str>,
        manual_keywords: Option<String>,
        now: Timestamp,
    ) -> Result<Block, LedgerError> {
        let block = self
            .engine
            .append(caller, payload, content_type, EncryptionRequest::None, None, manual_keywords, now)?;
        self.enqueue_index_update(&block);
        Ok(block)
    }

    pub fn append_encrypted_block(
        &self,
        caller: &KeyPair,
        payload: &[u8],
        content_type: Option<&str>,
        manual_keywords: Option<String>,
        now: Timestamp,
    ) -> Result<Block, LedgerError> {
        let bmek = self.bmek.get()?;
        let block = self.engine.append(
            caller,
            payload,
            content_type,
            EncryptionRequest::Bmek,
            Some(&bmek),
            manual_keywords,
            now,
        )?;
        self.enqueue_index_update(&block);
        Ok(block)
    }

    /// Secondary-index backend selection is out of scope (search query
    /// parsing/keyword extraction is an explicit Non-goal); this submits a
    /// stub unit of work purely to exercise the completion-barrier
    /// mechanics `IndexingCoordinator` provides.
    fn enqueue_index_update(&self, block: &Block) {
        let request = IndexingRequest {
            block_number: block.block_number,
            keywords: block.manual_keywords.clone(),
        };
        if let Err(e) = self.indexing.submit(request, |req| async move {
            let _ = req;
            Ok(())
        }) {
            warn!(error = %e, "index update not submitted");
        }
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn get_block(&self, n: BlockNumber) -> Result<Option<Block>, LedgerError> {
        Ok(self.engine.get_block(n)?)
    }

    pub fn retrieve_decrypted(&self, block: &Block) -> Result<Vec<u8>, LedgerError> {
        let bmek = self.bmek.get()?;
        Ok(self.engine.retrieve_decrypted(block, &bmek)?)
    }

    pub fn encrypt_existing_block(&self, block_number: BlockNumber) -> Result<Block, LedgerError> {
        let bmek = self.bmek.get()?;
        Ok(self.engine.encrypt_existing_block(block_number, &bmek)?)
    }

    pub fn block_count(&self) -> u64 {
        self.engine.block_count()
    }

    // ── Rollback ─────────────────────────────────────────────────────────────

    pub fn rollback(&self, caller: &KeyPair, to_block_number: BlockNumber) -> Result<Vec<Block>, LedgerError> {
        let caller_record = self.active_caller(caller)?;
        let now_head = self.engine.block_count().saturating_sub(1);
        Ok(self.engine.rollback(caller_record.role, to_block_number, now_head)?)
    }

    // ── Validation ───────────────────────────────────────────────────────────

    pub fn validate_structural(&self) -> Result<ValidationReport, LedgerError> {
        Ok(ChainValidator::new(self.engine.db()).validate_eager()?)
    }

    pub fn validate_streaming(
        &self,
        cancel: &CancellationToken,
        on_batch: impl FnMut(&ValidationReport),
    ) -> Result<ValidationReport, LedgerError> {
        Ok(ChainValidator::new(self.engine.db()).validate_streaming(cancel, on_batch)?)
    }

    // ── Export / import ──────────────────────────────────────────────────────

    pub fn export_chain(&self, dest_path: &Path) -> Result<(), LedgerError> {
        Ok(chainvault_io::export_chain(
            self.engine.db(),
            Some(self.engine.offchain()),
            dest_path,
            &self.config.data_dir,
        )?)
    }

    pub fn import_chain(&self, src_path: &Path) -> Result<(), LedgerError> {
        Ok(chainvault_io::import_chain(
            self.engine.db(),
            Some(self.engine.offchain()),
            src_path,
            &self.config.data_dir,
        )?)
    }

    // ── Destructive reset ────────────────────────────────────────────────────

    pub fn clear_and_reinitialize(
        &self,
        bootstrap: &KeyPair,
        owner_name: String,
        now: Timestamp,
    ) -> Result<(AuthorizedKeyRecord, Block), LedgerError> {
        Ok(self.engine.clear_and_reinitialize(bootstrap, owner_name, now)?)
    }

    // ── Maintenance ──────────────────────────────────────────────────────────

    pub fn start_maintenance(&self) -> Result<(), LedgerError> {
        let mut slot = self.maintenance.lock().unwrap();
        if slot.is_some() {
            return Ok(());
        }
        let scheduler = MaintenanceScheduler::new(
            std::sync::Arc::new(self.engine.db().clone()),
            std::sync::Arc::new(self.engine.offchain().clone()),
            self.config.maintenance_config(),
        )?;
        scheduler.start();
        *slot = Some(scheduler);
        Ok(())
    }

    pub fn stop_maintenance(&self) {
        if let Some(scheduler) = self.maintenance.lock().unwrap().take() {
            scheduler.stop();
        }
    }
}
