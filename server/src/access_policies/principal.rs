//! Principals: identities that can hold access policies.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::error::PermissionError;
use super::models::{PermissionLevel, PrincipalType, ResourceScope};
use super::resolver::verify_permission;
use crate::slashstepql::TableKeyRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum Principal {
    User(Uuid),
    Group(Uuid),
    Role(Uuid),
}

impl Principal {
    #[must_use]
    pub const fn from_parts(principal_type: PrincipalType, id: Uuid) -> Self {
        match principal_type {
            PrincipalType::User => Self::User(id),
            PrincipalType::Group => Self::Group(id),
            PrincipalType::Role => Self::Role(id),
        }
    }

    #[must_use]
    pub const fn principal_type(self) -> PrincipalType {
        match self {
            Self::User(_) => PrincipalType::User,
            Self::Group(_) => PrincipalType::Group,
            Self::Role(_) => PrincipalType::Role,
        }
    }

    #[must_use]
    pub const fn id(self) -> Uuid {
        match self {
            Self::User(id) | Self::Group(id) | Self::Role(id) => id,
        }
    }

    /// Filter key of the access policy column that references this principal.
    #[must_use]
    pub const fn filter_key(self) -> &'static str {
        match self {
            Self::User(_) => "principal_user_id",
            Self::Group(_) => "principal_group_id",
            Self::Role(_) => "principal_role_id",
        }
    }

    /// Whether this principal holds at least `minimum_level` for the action.
    ///
    /// Returns `Ok(false)` on denial; only lookup failures are errors.
    pub async fn check_permissions(
        self,
        pool: &PgPool,
        registry: &TableKeyRegistry,
        action_id: Uuid,
        scope: ResourceScope,
        minimum_level: PermissionLevel,
    ) -> Result<bool, PermissionError> {
        match self
            .verify_permissions(pool, registry, action_id, scope, minimum_level)
            .await
        {
            Ok(()) => Ok(true),
            Err(PermissionError::PermissionDenied { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Require at least `minimum_level` for the action.
    ///
    /// Fails with [`PermissionError::PermissionDenied`] when no policy applies
    /// or the applicable one is too weak.
    pub async fn verify_permissions(
        self,
        pool: &PgPool,
        registry: &TableKeyRegistry,
        action_id: Uuid,
        scope: ResourceScope,
        minimum_level: PermissionLevel,
    ) -> Result<(), PermissionError> {
        verify_permission(pool, registry, action_id, self, scope, minimum_level)
            .await
            .map(|_| ())
    }
}
