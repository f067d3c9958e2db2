//! `AuthorizedKeyRepository` (spec §4.6): ACID-transactional persistence of
//! principals. Joins through `chainvault_storage::LedgerDb`; holds no policy
//! of its own — RBAC decisions live in [`crate::policy`].

use chainvault_core::{AuthorizedKeyRecord, IoError, PublicKeyBytes, Role, SecurityError, Timestamp};
use chainvault_storage::LedgerDb;

pub struct AuthorizedKeyRepository<'a> {
    db: &'a LedgerDb,
}

impl<'a> AuthorizedKeyRepository<'a> {
    pub fn new(db: &'a LedgerDb) -> Self {
        Self { db }
    }

    pub fn insert(&self, record: AuthorizedKeyRecord) -> Result<(), IoError> {
        self.db.insert_authorized_key(&record)
    }

    pub fn find_by_public_key(&self, pk: &[u8]) -> Result<Option<AuthorizedKeyRecord>, IoError> {
        self.db.find_by_public_key(pk)
    }

    pub fn find_by_owner_name(&self, name: &str) -> Result<Option<AuthorizedKeyRecord>, IoError> {
        self.db.find_by_owner_name(name)
    }

    pub fn list_active(&self) -> Result<Vec<AuthorizedKeyRecord>, IoError> {
        self.db.list_active()
    }

    pub fn count_active_with_role(&self, role: Role) -> Result<u64, IoError> {
        Ok(self
            .db
            .list_active()?
            .into_iter()
            .filter(|r| r.role == role)
            .count() as u64)
    }

    pub fn is_empty(&self) -> bool {
        self.db.count_authorized_keys() == 0
    }

    /// Deactivate a principal, enforcing Invariant AK-1 (last-super-admin
    /// protection): revoking the sole remaining active `SUPER_ADMIN` fails.
    pub fn deactivate(&self, pk: &[u8], at: Timestamp) -> Result<(), RepositoryError> {
        let mut record = self
            .db
            .find_by_public_key(pk)?
            .ok_or_else(|| RepositoryError::NotFound)?;

        if record.role == Role::SuperAdmin && self.count_active_with_role(Role::SuperAdmin)? <= 1 {
            return Err(RepositoryError::Security(SecurityError::LastSuperAdmin));
        }

        record.is_active = false;
        record.revoked_at = Some(at);
        self.db.insert_authorized_key(&record)?;
        Ok(())
    }

    pub fn delete(&self, pk: &[u8]) -> Result<(), IoError> {
        self.db.delete_authorized_key(pk)
    }

    pub fn public_key_encoded_matches(record: &AuthorizedKeyRecord, public_key: &PublicKeyBytes) -> bool {
        record.public_key.0 == public_key.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error("no such authorized key")]
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainvault_storage::LedgerDb;

    fn repo_with_one_super_admin() -> (tempfile::TempDir, LedgerDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDb::open(dir.path()).unwrap();
        let record = AuthorizedKeyRecord::bootstrap(PublicKeyBytes(vec![1]), "root".into(), 0);
        db.insert_authorized_key(&record).unwrap();
        (dir, db)
    }

    #[test]
    fn revoking_sole_super_admin_fails() {
        let (_dir, db) = repo_with_one_super_admin();
        let repo = AuthorizedKeyRepository::new(&db);
        let err = repo.deactivate(&[1], 100).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Security(SecurityError::LastSuperAdmin)
        ));
    }

    #[test]
    fn revoking_second_to_last_super_admin_succeeds() {
        let (_dir, db) = repo_with_one_super_admin();
        let repo = AuthorizedKeyRepository::new(&db);
        repo.insert(AuthorizedKeyRecord::bootstrap(
            PublicKeyBytes(vec![2]),
            "second".into(),
            0,
        ))
        .unwrap();

        repo.deactivate(&[1], 100).unwrap();
        assert_eq!(repo.count_active_with_role(Role::SuperAdmin).unwrap(), 1);

        let err = repo.deactivate(&[2], 100).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Security(SecurityError::LastSuperAdmin)
        ));
    }

    #[test]
    fn deactivate_missing_key_is_not_found() {
        let (_dir, db) = repo_with_one_super_admin();
        let repo = AuthorizedKeyRepository::new(&db);
        let err = repo.deactivate(&[99], 100).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
