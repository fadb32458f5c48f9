//! Deepest-scope permission resolution.
//!
//! A check names a principal, an action, and the position of the acted-upon
//! resource (`item ⊂ project ⊂ workspace ⊂ instance`). Every policy for the
//! principal and action at one of those positions is a candidate; the most
//! specific one decides:
//!
//! 1. Item
//! 2. Project
//! 3. Workspace
//! 4. Instance
//!
//! The winning policy's level is final, even if a broader policy grants more
//! or less. Inheritance levels are not applied across the chain.

use std::cmp::Reverse;

use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::PermissionError;
use super::models::{AccessPolicy, PermissionLevel, ResourceScope, ScopedResourceType};
use super::principal::Principal;
use super::queries::list_for_principal;
use crate::slashstepql::{quote, TableKeyRegistry};

/// Find the most specific policy that applies to `principal` performing
/// `action_id` within `scope`.
///
/// Fails with [`PermissionError::NotFound`] when no policy applies.
#[tracing::instrument(skip(pool, registry))]
pub async fn resolve_deepest_scope(
    pool: &PgPool,
    registry: &TableKeyRegistry,
    action_id: Uuid,
    principal: Principal,
    scope: ResourceScope,
) -> Result<AccessPolicy, PermissionError> {
    let candidates = list_for_principal(
        pool,
        registry,
        principal,
        action_id,
        Some(&scope_filter(scope)),
    )
    .await?
    .into_iter()
    .map(|hydrated| hydrated.policy)
    .collect::<Vec<_>>();

    let candidate_count = candidates.len();
    let policy = select_deepest(candidates).ok_or(PermissionError::NotFound { action_id })?;

    debug!(
        policy_id = %policy.id,
        scope_type = %policy.scoped_resource_type,
        level = %policy.permission_level,
        candidate_count,
        "Resolved access policy"
    );

    Ok(policy)
}

/// Require `principal` to hold at least `minimum_level` for `action_id` in `scope`.
///
/// A missing policy is a denial: [`PermissionError::NotFound`] never escapes.
/// Returns the deciding policy on success.
#[tracing::instrument(skip(pool, registry))]
pub async fn verify_permission(
    pool: &PgPool,
    registry: &TableKeyRegistry,
    action_id: Uuid,
    principal: Principal,
    scope: ResourceScope,
    minimum_level: PermissionLevel,
) -> Result<AccessPolicy, PermissionError> {
    let resolved = match resolve_deepest_scope(pool, registry, action_id, principal, scope).await
    {
        Ok(policy) => Some(policy),
        Err(PermissionError::NotFound { .. }) => None,
        Err(err) => return Err(err),
    };

    check_level(action_id, resolved, minimum_level).inspect_err(|err| {
        info!(?principal, error = %err, "Permission denied");
    })
}

/// Compare a resolved policy (or its absence) against the required level.
pub fn check_level(
    action_id: Uuid,
    policy: Option<AccessPolicy>,
    minimum_level: PermissionLevel,
) -> Result<AccessPolicy, PermissionError> {
    match policy {
        Some(policy) if policy.permission_level >= minimum_level => Ok(policy),
        other => Err(PermissionError::PermissionDenied {
            action_id,
            minimum_level,
            actual_level: other.map(|policy| policy.permission_level),
        }),
    }
}

/// Pick the candidate at the deepest containment level.
///
/// Candidates at the same depth keep their input order; the first wins.
/// Candidates outside the containment chain are ignored.
pub fn select_deepest(candidates: Vec<AccessPolicy>) -> Option<AccessPolicy> {
    candidates
        .into_iter()
        .filter_map(|policy| {
            policy
                .scoped_resource_type
                .containment_depth()
                .map(|depth| (depth, policy))
        })
        .min_by_key(|(depth, _)| Reverse(*depth))
        .map(|(_, policy)| policy)
}

/// Filter expression matching policies scoped to any level of `scope`.
///
/// Produces `scoped_resource_type = "Instance" or scoped_workspace_id = "…" or …`
/// with only the levels the caller supplied.
fn scope_filter(scope: ResourceScope) -> String {
    let mut clauses = vec![format!(
        "scoped_resource_type = {}",
        quote(&ScopedResourceType::Instance.to_string())
    )];

    let levels = [
        (ScopedResourceType::Workspace, scope.workspace_id),
        (ScopedResourceType::Project, scope.project_id),
        (ScopedResourceType::Item, scope.item_id),
    ];

    for (kind, id) in levels {
        if let (Some(key), Some(id)) = (kind.id_key(), id) {
            clauses.push(format!("{key} = {}", quote(&id.to_string())));
        }
    }

    clauses.join(" or ")
}
