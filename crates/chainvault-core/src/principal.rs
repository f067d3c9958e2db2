//! A registered principal — the unit the RBAC subsystem authorizes.

use serde::{Deserialize, Serialize};

use crate::types::{PublicKeyBytes, Role, Timestamp};

/// A registered principal (`AuthorizedKeyRepository`'s row type, §4.6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthorizedKeyRecord {
    pub public_key: PublicKeyBytes,
    pub owner_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
    /// `owner_name` of the caller who created this entry; `None` for the
    /// bootstrap admin (Invariant AK-2).
    pub created_by: Option<String>,
}

impl AuthorizedKeyRecord {
    pub fn bootstrap(public_key: PublicKeyBytes, owner_name: String, now: Timestamp) -> Self {
        Self {
            public_key,
            owner_name,
            role: Role::SuperAdmin,
            is_active: true,
            created_at: now,
            revoked_at: None,
            created_by: None,
        }
    }
}
