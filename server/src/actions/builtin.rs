//! Built-in actions and the bootstrap admin grant.

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{Action, ActionError};
use crate::access_policies::{
    self, InheritanceLevel, NewAccessPolicy, PermissionLevel, PolicyScope, Principal,
};
use crate::slashstepql::{quote, TableKeyRegistry};

/// Name, display name, and description of each built-in action.
pub const BUILTIN_ACTIONS: &[(&str, &str, &str)] = &[
    (
        "slashstep.accessPolicies.get",
        "Get access policies",
        "View an individual access policy.",
    ),
    (
        "slashstep.accessPolicies.list",
        "List access policies",
        "List and count access policies.",
    ),
    (
        "slashstep.accessPolicies.create",
        "Create access policies",
        "Grant principals permission to perform actions.",
    ),
    (
        "slashstep.accessPolicies.update",
        "Update access policies",
        "Change the permission or inheritance level of an access policy.",
    ),
    (
        "slashstep.accessPolicies.delete",
        "Delete access policies",
        "Remove access policies.",
    ),
];

/// Insert the built-in actions, refreshing display fields of existing ones.
#[tracing::instrument(skip(pool))]
pub async fn ensure_builtin_actions(pool: &PgPool) -> Result<Vec<Action>, ActionError> {
    let mut actions = Vec::with_capacity(BUILTIN_ACTIONS.len());

    for (name, display_name, description) in BUILTIN_ACTIONS {
        let action = sqlx::query_as::<_, Action>(
            r"
            INSERT INTO actions (id, name, display_name, description)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                description = EXCLUDED.description
            RETURNING id, name, display_name, description, app_id
            ",
        )
        .bind(Uuid::now_v7())
        .bind(*name)
        .bind(*display_name)
        .bind(*description)
        .fetch_one(pool)
        .await?;

        actions.push(action);
    }

    info!(count = actions.len(), "Built-in actions ready");
    Ok(actions)
}

/// Give `user_id` an Instance-scoped Admin policy for each action it does not
/// already hold one for. Returns the number of policies created.
#[tracing::instrument(skip(pool, registry, actions))]
pub async fn grant_bootstrap_admin(
    pool: &PgPool,
    registry: &TableKeyRegistry,
    user_id: Uuid,
    actions: &[Action],
) -> Result<usize, ActionError> {
    let principal = Principal::User(user_id);
    let mut created = 0;

    for action in actions {
        let existing = access_policies::count(
            pool,
            registry,
            &format!(
                r#"action_id = {} and principal_user_id = {} and scoped_resource_type = "Instance" and permission_level = "Admin""#,
                quote(&action.id.to_string()),
                quote(&user_id.to_string())
            ),
        )
        .await?;

        if existing > 0 {
            continue;
        }

        access_policies::create(
            pool,
            &NewAccessPolicy::new(
                action.id,
                principal,
                PolicyScope::Instance,
                PermissionLevel::Admin,
                InheritanceLevel::Enabled,
            ),
        )
        .await?;
        created += 1;
    }

    if created > 0 {
        info!(%user_id, created, "Granted bootstrap admin policies");
    }

    Ok(created)
}
