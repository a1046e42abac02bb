//! Error types for engine operations.
//!
//! Two layers: [`DbError`] covers storage faults (connection, SQL, schema),
//! while [`StewardError`] is the operation-level taxonomy callers match on.
//! Every variant carries enough context to report without a stack trace, and
//! [`StewardError::code`] gives a stable machine-readable identifier that
//! survives message rewording.

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum StewardError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Parent account not found: {0}")]
    ParentNotFound(String),

    #[error("Relationship not found: {0}")]
    RelationshipNotFound(String),

    /// Field-level failures accumulated across the whole payload, not just
    /// the first one hit.
    #[error("Validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("Circular hierarchy: {0}")]
    CircularHierarchy(String),

    #[error("Hierarchy too deep: {0}")]
    HierarchyTooDeep(String),

    #[error("Account has children: {0}")]
    HasChildren(String),

    #[error("Cross-tenant operation rejected: {0}")]
    CrossTenant(String),

    /// Aggregate result of an integrity sweep that found problems.
    #[error("Integrity violations: {}", .0.join("; "))]
    IntegrityViolation(Vec<String>),

    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

impl StewardError {
    /// Stable identifier for each variant, independent of message wording.
    pub fn code(&self) -> &'static str {
        match self {
            StewardError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            StewardError::ParentNotFound(_) => "PARENT_NOT_FOUND",
            StewardError::RelationshipNotFound(_) => "RELATIONSHIP_NOT_FOUND",
            StewardError::ValidationFailed(_) => "VALIDATION_FAILED",
            StewardError::CircularHierarchy(_) => "CIRCULAR_HIERARCHY",
            StewardError::HierarchyTooDeep(_) => "HIERARCHY_TOO_DEEP",
            StewardError::HasChildren(_) => "HAS_CHILDREN",
            StewardError::CrossTenant(_) => "CROSS_TENANT",
            StewardError::IntegrityViolation(_) => "INTEGRITY_VIOLATION",
            StewardError::Db(_) => "DB_ERROR",
        }
    }

    /// True when the request conflicts with current data state, as opposed
    /// to bad input or a storage fault.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StewardError::CircularHierarchy(_)
                | StewardError::HierarchyTooDeep(_)
                | StewardError::HasChildren(_)
                | StewardError::CrossTenant(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StewardError::AccountNotFound(_)
                | StewardError::ParentNotFound(_)
                | StewardError::RelationshipNotFound(_)
        )
    }
}
