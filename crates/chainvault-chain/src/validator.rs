//! `ChainValidator` (spec §4.9): structural integrity plus RBAC-compliance
//! checks, in eager (whole-chain) or streaming (bounded-memory batch) modes.

use chainvault_core::{
    Block, BlockHash, BlockNumber, IntegrityError, StateError, EAGER_VALIDATION_MAX_BLOCKS,
    EAGER_VALIDATION_WARN_BLOCKS, STREAMING_BATCH_SIZE,
};
use chainvault_rbac::AuthorizedKeyRepository;
use chainvault_storage::LedgerDb;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ChainError;

/// One validation failure: the offending block and a human-readable cause.
#[derive(Debug, Clone)]
pub struct ValidationFailure {
    pub block_number: BlockNumber,
    pub reason: String,
}

/// Accumulated result of a structural + compliance pass over some or all of
/// the chain.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub blocks_checked: u64,
    pub failures: Vec<ValidationFailure>,
    pub cancelled: bool,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, block_number: BlockNumber, reason: impl Into<String>) {
        self.failures.push(ValidationFailure {
            block_number,
            reason: reason.into(),
        });
    }
}

pub struct ChainValidator<'a> {
    db: &'a LedgerDb,
}

impl<'a> ChainValidator<'a> {
    pub fn new(db: &'a LedgerDb) -> Self {
        Self { db }
    }

    /// Checks one block against its expected predecessor hash: recomputed
    /// hash, chain linkage, signature, then whether its signer is still an
    /// active authorized key. Stops at the first failing check for this
    /// block — a broken hash makes linkage/signature checks moot.
    fn check_one(&self, block: &Block, expected_previous_hash: &BlockHash, report: &mut ValidationReport) {
        let preimage = block.preimage();
        let recomputed = chainvault_crypto::block_hash(&preimage);
        if recomputed != block.hash {
            report.record(block.block_number, IntegrityError::HashMismatch(block.block_number).to_string());
            return;
        }

        if &block.previous_hash != expected_previous_hash {
            report.record(block.block_number, IntegrityError::ChainBreak(block.block_number).to_string());
            return;
        }

        if chainvault_crypto::signature::verify(&block.signer_public_key, &preimage, &block.signature).is_err() {
            report.record(block.block_number, IntegrityError::SignatureMismatch(block.block_number).to_string());
            return;
        }

        if block.is_genesis() {
            return;
        }

        let repo = AuthorizedKeyRepository::new(self.db);
        match repo.find_by_public_key(&block.signer_public_key.0) {
            Ok(Some(record)) if record.is_active => {}
            Ok(Some(_)) => report.record(block.block_number, "signer's authorized key has since been revoked"),
            Ok(None) => report.record(block.block_number, "signer is not a known authorized key"),
            Err(e) => report.record(block.block_number, format!("lookup failed: {e}")),
        }
    }

    /// Eager validation: loads and checks every block in one pass. Warns
    /// past [`EAGER_VALIDATION_WARN_BLOCKS`], refuses outright at or past
    /// [`EAGER_VALIDATION_MAX_BLOCKS`] — callers that size is over the
    /// ceiling must use [`Self::validate_streaming`] instead (spec §4.9).
    pub fn validate_eager(&self) -> Result<ValidationReport, ChainError> {
        let count = self.db.block_count();
        if count >= EAGER_VALIDATION_MAX_BLOCKS {
            return Err(StateError::TooLarge {
                limit: EAGER_VALIDATION_MAX_BLOCKS,
            }
            .into());
        }
        if count > EAGER_VALIDATION_WARN_BLOCKS {
            warn!(count, ceiling = EAGER_VALIDATION_WARN_BLOCKS, "eager validation over the recommended size");
        }

        let mut report = ValidationReport::default();
        let mut previous_hash = BlockHash::zero();
        for item in self.db.iter_blocks() {
            let block = item?;
            self.check_one(&block, &previous_hash, &mut report);
            previous_hash = block.hash;
            report.blocks_checked += 1;
        }
        info!(blocks = report.blocks_checked, valid = report.is_valid(), "eager validation complete");
        Ok(report)
    }

    /// Streaming validation: processes the chain in batches of
    /// [`STREAMING_BATCH_SIZE`], invoking `on_batch` with the
    /// running report after each — so a caller can report progress without
    /// holding the whole chain in memory — and honoring `cancel` between
    /// batches.
    pub fn validate_streaming(
        &self,
        cancel: &CancellationToken,
        mut on_batch: impl FnMut(&ValidationReport),
    ) -> Result<ValidationReport, ChainError> {
        let mut report = ValidationReport::default();
        let mut previous_hash = BlockHash::zero();
        let mut since_last_batch = 0usize;

        for item in self.db.iter_blocks() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                warn!(blocks = report.blocks_checked, "streaming validation cancelled");
                break;
            }
            let block = item?;
            self.check_one(&block, &previous_hash, &mut report);
            previous_hash = block.hash;
            report.blocks_checked += 1;
            since_last_batch += 1;

            if since_last_batch >= STREAMING_BATCH_SIZE {
                on_batch(&report);
                since_last_batch = 0;
            }
        }
        if since_last_batch > 0 {
            on_batch(&report);
        }
        info!(blocks = report.blocks_checked, valid = report.is_valid(), "streaming validation complete");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::chainvault_chain_test_support::*;

    #[test]
    fn valid_chain_reports_no_failures() {
        let (_dir, db, root) = bootstrap_chain();
        append_plain(&db, &root, b"one", 1001);
        append_plain(&db, &root, b"two", 1002);

        let validator = ChainValidator::new(&db);
        let report = validator.validate_eager().unwrap();
        assert!(report.is_valid());
        assert_eq!(report.blocks_checked, 3);
    }

    #[test]
    fn tampered_data_is_caught() {
        let (_dir, db, root) = bootstrap_chain();
        append_plain(&db, &root, b"one", 1001);

        let mut block = db.get_block(1).unwrap().unwrap();
        block.data = "tampered".to_string();
        db.put_block(&block).unwrap();

        let validator = ChainValidator::new(&db);
        let report = validator.validate_eager().unwrap();
        assert!(!report.is_valid());
        assert_eq!(report.failures[0].block_number, 1);
    }

    #[test]
    fn revoked_signer_fails_compliance_but_not_structure() {
        let (_dir, db, root) = bootstrap_chain();
        let block = append_plain(&db, &root, b"one", 1001);
        assert_eq!(block.block_number, 1);

        let repo = AuthorizedKeyRepository::new(&db);
        repo.deactivate(&root.public_key.0, 2000).unwrap_err();
        // root is the sole SUPER_ADMIN, so direct deactivation is refused by
        // the repository (Invariant AK-1); simulate an already-revoked
        // second key instead to exercise the compliance path in isolation.
        let second = chainvault_crypto::KeyPair::generate();
        let record = chainvault_core::AuthorizedKeyRecord {
            public_key: second.public_key.clone(),
            owner_name: "second".into(),
            role: chainvault_core::Role::User,
            is_active: false,
            created_at: 1000,
            revoked_at: Some(1500),
            created_by: Some("root".into()),
        };
        repo.insert(record).unwrap();

        let preimage = chainvault_core::Block::canonical_preimage(
            2,
            1600,
            &block.hash,
            "forged",
            &second.public_key,
        );
        let hash = chainvault_crypto::block_hash(&preimage);
        let signature = second.sign(&preimage).unwrap();
        let forged = chainvault_core::Block {
            block_number: 2,
            timestamp: 1600,
            previous_hash: block.hash,
            data: "forged".into(),
            signer_public_key: second.public_key.clone(),
            signature,
            hash,
            is_encrypted: false,
            encryption_metadata: None,
            off_chain_reference: None,
            manual_keywords: None,
            auto_keywords: None,
        };
        db.insert_block_with_expected_number(2, forged).unwrap();

        let validator = ChainValidator::new(&db);
        let report = validator.validate_eager().unwrap();
        assert!(!report.is_valid());
        assert_eq!(report.failures[0].block_number, 2);
        assert!(report.failures[0].reason.contains("revoked"));
    }

    #[test]
    fn streaming_matches_eager_on_small_chain() {
        let (_dir, db, root) = bootstrap_chain();
        append_plain(&db, &root, b"one", 1001);
        append_plain(&db, &root, b"two", 1002);

        let token = CancellationToken::new();
        let mut batches = 0;
        let validator = ChainValidator::new(&db);
        let report = validator
            .validate_streaming(&token, |_| batches += 1)
            .unwrap();
        assert!(report.is_valid());
        assert_eq!(report.blocks_checked, 3);
        assert!(batches >= 1);
    }

    #[test]
    fn cancellation_stops_early() {
        let (_dir, db, root) = bootstrap_chain();
        append_plain(&db, &root, b"one", 1001);

        let token = CancellationToken::new();
        token.cancel();
        let validator = ChainValidator::new(&db);
        let report = validator.validate_streaming(&token, |_| {}).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.blocks_checked, 0);
    }

    /// Spec §8: eager validation hard-fails at exactly 500,000 blocks, not
    /// "more than". Fabricates blocks directly through the storage layer
    /// (bypassing signing) since the count check runs before any per-block
    /// work — only `db.block_count()` needs to hit the ceiling.
    #[test]
    fn eager_validation_hard_fails_at_exactly_the_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDb::open(dir.path()).unwrap();
        chainvault_chain_test_support::fill_with_dummy_blocks(&db, EAGER_VALIDATION_MAX_BLOCKS - 1);
        assert_eq!(db.block_count(), EAGER_VALIDATION_MAX_BLOCKS - 1);

        let validator = ChainValidator::new(&db);
        assert!(validator.validate_eager().is_ok());

        chainvault_chain_test_support::fill_with_dummy_blocks(&db, 1);
        assert_eq!(db.block_count(), EAGER_VALIDATION_MAX_BLOCKS);

        let err = ChainValidator::new(&db).validate_eager().unwrap_err();
        assert!(matches!(err, ChainError::State(StateError::TooLarge { limit }) if limit == EAGER_VALIDATION_MAX_BLOCKS));
    }
}

/// Test-only helpers shared by this module's tests, kept small and local
/// rather than pulled into a separate crate.
#[cfg(test)]
mod chainvault_chain_test_support {
    use chainvault_core::{AuthorizedKeyRecord, Block};
    use chainvault_crypto::KeyPair;
    use chainvault_storage::LedgerDb;

    pub fn bootstrap_chain() -> (tempfile::TempDir, LedgerDb, KeyPair) {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDb::open(dir.path()).unwrap();
        let root = KeyPair::generate();
        let record = AuthorizedKeyRecord::bootstrap(root.public_key.clone(), "root".into(), 1000);
        db.insert_authorized_key(&record).unwrap();

        let data = "GENESIS".to_string();
        let preimage = Block::canonical_preimage(0, 1000, &chainvault_core::BlockHash::zero(), &data, &root.public_key);
        let hash = chainvault_crypto::block_hash(&preimage);
        let signature = root.sign(&preimage).unwrap();
        let genesis = Block {
            block_number: 0,
            timestamp: 1000,
            previous_hash: chainvault_core::BlockHash::zero(),
            data,
            signer_public_key: root.public_key.clone(),
            signature,
            hash,
            is_encrypted: false,
            encryption_metadata: None,
            off_chain_reference: None,
            manual_keywords: None,
            auto_keywords: None,
        };
        db.insert_block_with_expected_number(0, genesis).unwrap();
        (dir, db, root)
    }

    pub fn append_plain(db: &LedgerDb, signer: &KeyPair, payload: &[u8], now: i64) -> Block {
        let data = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, payload);
        let previous_hash = db.head_hash().unwrap();
        let block_number = db.peek_next_block_number().unwrap();
        let preimage = Block::canonical_preimage(block_number, now, &previous_hash, &data, &signer.public_key);
        let hash = chainvault_crypto::block_hash(&preimage);
        let signature = signer.sign(&preimage).unwrap();
        let block = Block {
            block_number,
            timestamp: now,
            previous_hash,
            data,
            signer_public_key: signer.public_key.clone(),
            signature,
            hash,
            is_encrypted: false,
            encryption_metadata: None,
            off_chain_reference: None,
            manual_keywords: None,
            auto_keywords: None,
        };
        db.insert_block_with_expected_number(block_number, block).unwrap()
    }

    /// Inserts `count` blocks directly through the storage layer, skipping
    /// signing — only useful for tests that exercise a block-count ceiling
    /// rather than per-block integrity.
    pub fn fill_with_dummy_blocks(db: &LedgerDb, count: u64) {
        let start = db.peek_next_block_number().unwrap();
        for offset in 0..count {
            let block_number = start + offset;
            let block = Block {
                block_number,
                timestamp: 0,
                previous_hash: chainvault_core::BlockHash::zero(),
                data: String::new(),
                signer_public_key: chainvault_core::PublicKeyBytes(Vec::new()),
                signature: chainvault_core::SignatureBytes(Vec::new()),
                hash: chainvault_core::BlockHash::zero(),
                is_encrypted: false,
                encryption_metadata: None,
                off_chain_reference: None,
                manual_keywords: None,
                auto_keywords: None,
            };
            db.insert_block_with_expected_number(block_number, block).unwrap();
        }
    }
}
