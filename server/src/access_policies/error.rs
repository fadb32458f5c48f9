//! Access Policy Error Types

use uuid::Uuid;

use super::models::{PermissionLevel, PrincipalType, ScopedResourceType};
use crate::slashstepql::SlashstepQLError;

#[derive(Debug, thiserror::Error)]
pub enum AccessPolicyError {
    #[error("Invalid permission level: {0}")]
    InvalidPermissionLevel(String),

    #[error("Invalid inheritance level: {0}")]
    InvalidInheritanceLevel(String),

    #[error("Invalid principal type: {0}")]
    InvalidPrincipalType(String),

    #[error("Invalid scoped resource type: {0}")]
    InvalidScopedResourceType(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Exactly one principal reference matching principal type {0} is required")]
    PrincipalReferenceMismatch(PrincipalType),

    #[error("Scope type {0} requires exactly its own scoped resource reference")]
    ScopeReferenceMismatch(ScopedResourceType),

    #[error("Invalid UUID for {key}: {value}")]
    InvalidUuid { key: String, value: String },

    #[error("Action {0} does not exist")]
    ActionNotFound(Uuid),

    #[error("Couldn't find an access policy with ID \"{0}\"")]
    NotFound(Uuid),

    #[error(transparent)]
    SlashstepQL(#[from] SlashstepQLError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Permission check errors.
#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    /// No policy applies to the principal, action, and scope.
    #[error("No access policy applies to action {action_id}")]
    NotFound { action_id: Uuid },

    /// No policy applies, or the applicable one is below the required level.
    #[error("Permission denied for action {action_id}: requires {minimum_level}")]
    PermissionDenied {
        action_id: Uuid,
        minimum_level: PermissionLevel,
        actual_level: Option<PermissionLevel>,
    },

    #[error(transparent)]
    Policy(#[from] AccessPolicyError),
}

impl From<sqlx::Error> for PermissionError {
    fn from(err: sqlx::Error) -> Self {
        Self::Policy(AccessPolicyError::Database(err))
    }
}
