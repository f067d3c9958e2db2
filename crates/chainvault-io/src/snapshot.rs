//! The schema-versioned wire format export/import exchange (spec §4.12,
//! §6): a single JSON document, every binary field base64/hex-encoded so
//! the file is plain, diffable UTF-8.

use chainvault_core::{
    AuthorizedKeyRecord, Block, BlockHash, BlockNumber, OffChainReference, PublicKeyBytes, Role,
    SignatureBytes, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::error::ImportError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedBlock {
    pub block_number: BlockNumber,
    pub timestamp: Timestamp,
    pub previous_hash: String,
    pub data: String,
    pub signer_public_key: String,
    pub signature: String,
    pub hash: String,
    pub is_encrypted: bool,
    pub encryption_metadata: Option<String>,
    pub off_chain_reference: Option<OffChainReference>,
    pub manual_keywords: Option<String>,
    pub auto_keywords: Option<String>,
}

impl ExportedBlock {
    pub fn from_block(b: &Block) -> Self {
        Self {
            block_number: b.block_number,
            timestamp: b.timestamp,
            previous_hash: b.previous_hash.to_hex(),
            data: b.data.clone(),
            signer_public_key: b.signer_public_key.to_encoded(),
            signature: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &b.signature.0),
            hash: b.hash.to_hex(),
            is_encrypted: b.is_encrypted,
            encryption_metadata: b.encryption_metadata.clone(),
            off_chain_reference: b.off_chain_reference.clone(),
            manual_keywords: b.manual_keywords.clone(),
            auto_keywords: b.auto_keywords.clone(),
        }
    }

    pub fn into_block(self) -> Result<Block, ImportError> {
        let previous_hash =
            BlockHash::from_hex(&self.previous_hash).map_err(|_| ImportError::Malformed("previous_hash"))?;
        let hash = BlockHash::from_hex(&self.hash).map_err(|_| ImportError::Malformed("hash"))?;
        let signer_public_key =
            PublicKeyBytes::from_encoded(&self.signer_public_key).map_err(|_| ImportError::Malformed("signer_public_key"))?;
        let signature_bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &self.signature)
            .map_err(|_| ImportError::Malformed("signature"))?;

        Ok(Block {
            block_number: self.block_number,
            timestamp: self.timestamp,
            previous_hash,
            data: self.data,
            signer_public_key,
            signature: SignatureBytes(signature_bytes),
            hash,
            is_encrypted: self.is_encrypted,
            encryption_metadata: self.encryption_metadata,
            off_chain_reference: self.off_chain_reference,
            manual_keywords: self.manual_keywords,
            auto_keywords: self.auto_keywords,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedKey {
    pub public_key: String,
    pub owner_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
    pub created_by: Option<String>,
}

impl ExportedKey {
    pub fn from_record(r: &AuthorizedKeyRecord) -> Self {
        Self {
            public_key: r.public_key.to_encoded(),
            owner_name: r.owner_name.clone(),
            role: r.role,
            is_active: r.is_active,
            created_at: r.created_at,
            revoked_at: r.revoked_at,
            created_by: r.created_by.clone(),
        }
    }

    pub fn into_record(self) -> Result<AuthorizedKeyRecord, ImportError> {
        let public_key =
            PublicKeyBytes::from_encoded(&self.public_key).map_err(|_| ImportError::Malformed("public_key"))?;
        Ok(AuthorizedKeyRecord {
            public_key,
            owner_name: self.owner_name,
            role: self.role,
            is_active: self.is_active,
            created_at: self.created_at,
            revoked_at: self.revoked_at,
            created_by: self.created_by,
        })
    }
}

/// The top-level export document (spec §6): `schema_version`, ascending
/// `blocks`, `authorized_keys`, and an optional off-chain manifest naming
/// the content hashes bundled in the sibling `<stem>.offchain/` directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSnapshot {
    pub schema_version: u32,
    pub blocks: Vec<ExportedBlock>,
    pub authorized_keys: Vec<ExportedKey>,
    pub off_chain_manifest: Option<Vec<String>>,
}
