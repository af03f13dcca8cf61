//! Authorization policy table
//!
//! One explicit mapping from (operation, role, ownership) to allow/deny,
//! testable without going through the service layer. Handlers never make
//! ad-hoc role checks; they ask this table.

use serde::{Deserialize, Serialize};

use super::Role;

/// Operations subject to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateComplaint,
    ReadComplaint,
    ListComplaints,
    UpdateComplaint,
    DeleteComplaint,
    AddComment,
    ShareComplaint,
    TransitionStatus,
    TaxonomyRead,
    TaxonomyWrite,
}

/// Check whether `role` may perform `op`.
///
/// `is_owner` is whether the principal owns the target complaint; it is
/// ignored for operations that have no target (create, list, taxonomy).
/// Admins see and transition everything but do not impersonate the filer:
/// update/delete/comment/share stay owner-only.
pub fn is_allowed(op: Operation, role: Role, is_owner: bool) -> bool {
    match op {
        // Open to any authenticated principal
        Operation::CreateComplaint | Operation::ListComplaints | Operation::TaxonomyRead => true,

        // Owner, or any admin
        Operation::ReadComplaint => is_owner || role >= Role::Admin,

        // Strictly owner-gated
        Operation::UpdateComplaint
        | Operation::DeleteComplaint
        | Operation::AddComment
        | Operation::ShareComplaint => is_owner,

        // Admin only
        Operation::TransitionStatus | Operation::TaxonomyWrite => role >= Role::Admin,
    }
}

/// Operations that additionally require a verified account
pub fn requires_verified(op: Operation) -> bool {
    matches!(op, Operation::CreateComplaint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_open_to_users() {
        assert!(is_allowed(Operation::CreateComplaint, Role::User, false));
        assert!(is_allowed(Operation::CreateComplaint, Role::Admin, false));
        assert!(requires_verified(Operation::CreateComplaint));
    }

    #[test]
    fn test_read_owner_or_admin() {
        assert!(is_allowed(Operation::ReadComplaint, Role::User, true));
        assert!(!is_allowed(Operation::ReadComplaint, Role::User, false));
        assert!(is_allowed(Operation::ReadComplaint, Role::Admin, false));
    }

    #[test]
    fn test_mutations_owner_only() {
        for op in [
            Operation::UpdateComplaint,
            Operation::DeleteComplaint,
            Operation::AddComment,
            Operation::ShareComplaint,
        ] {
            assert!(is_allowed(op, Role::User, true));
            assert!(!is_allowed(op, Role::User, false));
            // Admin without ownership is still denied
            assert!(!is_allowed(op, Role::Admin, false));
        }
    }

    #[test]
    fn test_admin_gates() {
        assert!(!is_allowed(Operation::TransitionStatus, Role::User, true));
        assert!(is_allowed(Operation::TransitionStatus, Role::Admin, false));
        assert!(!is_allowed(Operation::TaxonomyWrite, Role::User, false));
        assert!(is_allowed(Operation::TaxonomyWrite, Role::Admin, false));
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Admin > Role::User);
    }
}
