//! Pure RBAC decisions (spec §4.7). No I/O, no locking — a truth table over
//! `(callerRole, targetRole, op)`, in the spirit of the ancestor workspace's
//! `chronx-consensus::validator`, which is likewise a pure decision module.

use chainvault_core::{Role, SecurityError};

/// The operation an RBAC decision is being made about, carried in
/// `SecurityError::PermissionDenied` for diagnosability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    CreateKey,
    Revoke,
    Append,
    Rollback,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::CreateKey => "create_key",
            Operation::Revoke => "revoke",
            Operation::Append => "append",
            Operation::Rollback => "rollback",
        };
        write!(f, "{s}")
    }
}

/// Creation matrix (spec §4.7): `SUPER_ADMIN` may create any role;
/// `ADMIN` may create `USER`/`READ_ONLY` only; `USER`/`READ_ONLY` create
/// nothing.
pub fn can_create(caller: Role, target: Role) -> bool {
    match caller {
        Role::SuperAdmin => true,
        Role::Admin => matches!(target, Role::User | Role::ReadOnly),
        Role::User | Role::ReadOnly => false,
    }
}

/// Revocation rule (spec §4.7): `SUPER_ADMIN` may revoke any role (subject
/// to Invariant AK-1, enforced by the repository layer, not here);
/// `ADMIN` may revoke `USER`/`READ_ONLY` only.
pub fn can_revoke(caller: Role, target: Role) -> bool {
    match caller {
        Role::SuperAdmin => true,
        Role::Admin => matches!(target, Role::User | Role::ReadOnly),
        Role::User | Role::ReadOnly => false,
    }
}

/// Any role except `READ_ONLY` may append a block.
pub fn can_append(caller: Role) -> bool {
    caller != Role::ReadOnly
}

/// Rollback depth bound: `None` means unbounded, `Some(0)` means not
/// permitted at all.
pub fn max_rollback_depth(caller: Role) -> Option<u64> {
    match caller {
        Role::SuperAdmin => None,
        Role::Admin => Some(100),
        Role::User | Role::ReadOnly => Some(0),
    }
}

pub fn can_rollback(caller: Role, depth: u64) -> bool {
    match max_rollback_depth(caller) {
        None => true,
        Some(bound) => depth <= bound && bound > 0,
    }
}

/// Evaluate `op` for `(caller, target)` and turn a denial into the spec's
/// `SecurityError::PermissionDenied` carrying both roles and the op name.
pub fn authorize(caller: Role, target: Role, op: Operation) -> Result<(), SecurityError> {
    let allowed = match op {
        Operation::CreateKey => can_create(caller, target),
        Operation::Revoke => can_revoke(caller, target),
        Operation::Append => can_append(caller),
        Operation::Rollback => true, // depth bound is checked separately by the caller
    };
    if allowed {
        Ok(())
    } else {
        Err(SecurityError::PermissionDenied {
            caller_role: caller,
            target_role: target,
            op: op.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Role::*;

    #[test]
    fn creation_matrix_matches_spec_table() {
        assert!(can_create(SuperAdmin, SuperAdmin));
        assert!(can_create(SuperAdmin, Admin));
        assert!(can_create(SuperAdmin, User));
        assert!(can_create(SuperAdmin, ReadOnly));

        assert!(!can_create(Admin, SuperAdmin));
        assert!(!can_create(Admin, Admin));
        assert!(can_create(Admin, User));
        assert!(can_create(Admin, ReadOnly));

        assert!(!can_create(User, SuperAdmin));
        assert!(!can_create(User, User));
        assert!(!can_create(ReadOnly, ReadOnly));
    }

    #[test]
    fn revocation_rule_matches_spec() {
        assert!(can_revoke(SuperAdmin, SuperAdmin));
        assert!(can_revoke(SuperAdmin, Admin));
        assert!(!can_revoke(Admin, SuperAdmin));
        assert!(!can_revoke(Admin, Admin));
        assert!(can_revoke(Admin, User));
        assert!(!can_revoke(User, User));
    }

    #[test]
    fn append_excludes_only_read_only() {
        assert!(can_append(SuperAdmin));
        assert!(can_append(Admin));
        assert!(can_append(User));
        assert!(!can_append(ReadOnly));
    }

    #[test]
    fn rollback_bound_matches_spec() {
        assert_eq!(max_rollback_depth(SuperAdmin), None);
        assert_eq!(max_rollback_depth(Admin), Some(100));
        assert_eq!(max_rollback_depth(User), Some(0));

        assert!(can_rollback(SuperAdmin, 10_000));
        assert!(can_rollback(Admin, 100));
        assert!(!can_rollback(Admin, 101));
        assert!(!can_rollback(User, 1));
        assert!(!can_rollback(ReadOnly, 0));
    }

    #[test]
    fn role_ordering_is_privilege_ordering() {
        assert!(SuperAdmin > Admin);
        assert!(Admin > User);
        assert!(User > ReadOnly);
    }

    #[test]
    fn authorize_carries_roles_and_op_on_denial() {
        let err = authorize(Admin, SuperAdmin, Operation::CreateKey).unwrap_err();
        match err {
            SecurityError::PermissionDenied { caller_role, target_role, op } => {
                assert_eq!(caller_role, Admin);
                assert_eq!(target_role, SuperAdmin);
                assert_eq!(op, "create_key");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }
}
