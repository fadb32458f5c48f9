//! Reusable helpers for access control integration tests.
#![allow(dead_code)]

use slashstep_server::access_policies::{
    self, AccessPolicy, InheritanceLevel, NewAccessPolicy, PermissionLevel, PolicyScope,
    Principal,
};
use slashstep_server::actions::{self, Action, NewAction};
use sqlx::PgPool;
use uuid::Uuid;

/// Create an action with a unique name derived from `prefix`.
pub async fn create_test_action(pool: &PgPool, prefix: &str) -> Action {
    let name = format!("{prefix}.{}", Uuid::new_v4().simple());
    actions::create(
        pool,
        &NewAction {
            display_name: name.clone(),
            name,
            description: String::new(),
            app_id: None,
        },
    )
    .await
    .expect("Failed to create test action")
}

/// Grant `principal` a level on `action_id` at `scope`.
pub async fn grant(
    pool: &PgPool,
    action_id: Uuid,
    principal: Principal,
    scope: PolicyScope,
    level: PermissionLevel,
) -> AccessPolicy {
    access_policies::create(
        pool,
        &NewAccessPolicy::new(action_id, principal, scope, level, InheritanceLevel::Enabled),
    )
    .await
    .expect("Failed to create test access policy")
}
