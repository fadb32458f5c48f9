//! Access Control Integration Tests
//!
//! Run with: `cargo test --test access_control_test -- --nocapture`
//!
//! Requires `DATABASE_URL`; each test gets a fresh database with migrations applied.

mod helpers;

use helpers::{create_test_action, grant};
use slashstep_server::access_policies::{
    self, AccessPolicyError, PermissionError, PermissionLevel, PolicyScope, Principal,
    ResourceScope,
};
use slashstep_server::actions;
use slashstep_server::db::ListLimits;
use slashstep_server::slashstepql::{SlashstepQLError, TableKeyRegistry};
use sqlx::PgPool;
use uuid::Uuid;

// ============================================================================
// Handler-style permission checks
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
async fn test_list_policies_requires_list_permission(pool: PgPool) {
    let registry = TableKeyRegistry::builtin();
    let builtin = actions::ensure_builtin_actions(&pool)
        .await
        .expect("Failed to ensure built-in actions");
    let list_action = actions::get_by_name(&pool, "slashstep.accessPolicies.list")
        .await
        .expect("Missing built-in action");

    let admin_id = Uuid::new_v4();
    actions::grant_bootstrap_admin(&pool, &registry, admin_id, &builtin)
        .await
        .expect("Failed to grant bootstrap admin");

    let workspace_id = Uuid::new_v4();
    let viewer = Principal::Group(Uuid::new_v4());
    grant(
        &pool,
        list_action.id,
        viewer,
        PolicyScope::Workspace(workspace_id),
        PermissionLevel::User,
    )
    .await;

    let in_workspace = ResourceScope::instance().with_workspace(workspace_id);
    let elsewhere = ResourceScope::instance().with_workspace(Uuid::new_v4());

    viewer
        .verify_permissions(&pool, &registry, list_action.id, in_workspace, PermissionLevel::User)
        .await
        .expect("Group should list policies in its workspace");

    let denied = viewer
        .verify_permissions(&pool, &registry, list_action.id, elsewhere, PermissionLevel::User)
        .await;
    assert!(matches!(
        denied,
        Err(PermissionError::PermissionDenied {
            actual_level: None,
            ..
        })
    ));

    Principal::User(admin_id)
        .verify_permissions(&pool, &registry, list_action.id, elsewhere, PermissionLevel::Admin)
        .await
        .expect("Bootstrap admin should hold Admin everywhere");

    let policies = access_policies::list(
        &pool,
        &registry,
        r#"action_name = "slashstep.accessPolicies.list""#,
        ListLimits::default(),
    )
    .await
    .expect("List failed");
    assert_eq!(policies.len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_item_policy_overrides_broader_grants(pool: PgPool) {
    let registry = TableKeyRegistry::builtin();
    let action = create_test_action(&pool, "test.items.edit").await;
    let user = Principal::User(Uuid::new_v4());
    let workspace_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();
    let locked_item = Uuid::new_v4();
    let open_item = Uuid::new_v4();

    grant(&pool, action.id, user, PolicyScope::Instance, PermissionLevel::User).await;
    grant(&pool, action.id, user, PolicyScope::Project(project_id), PermissionLevel::Editor).await;
    grant(&pool, action.id, user, PolicyScope::Item(locked_item), PermissionLevel::None).await;

    let project = ResourceScope::instance()
        .with_workspace(workspace_id)
        .with_project(project_id);

    let open = user
        .check_permissions(
            &pool,
            &registry,
            action.id,
            project.with_item(open_item),
            PermissionLevel::Editor,
        )
        .await
        .expect("Check failed");
    assert!(open, "Project policy should apply to items without their own");

    let locked = user
        .check_permissions(
            &pool,
            &registry,
            action.id,
            project.with_item(locked_item),
            PermissionLevel::User,
        )
        .await
        .expect("Check failed");
    assert!(!locked, "Item policy should win over project and instance");

    let workspace_only = user
        .check_permissions(
            &pool,
            &registry,
            action.id,
            ResourceScope::instance().with_workspace(workspace_id),
            PermissionLevel::Editor,
        )
        .await
        .expect("Check failed");
    assert!(!workspace_only, "Instance policy only grants User");
}

// ============================================================================
// Policy management
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
async fn test_policy_lifecycle(pool: PgPool) {
    let registry = TableKeyRegistry::builtin();
    let action = create_test_action(&pool, "test.milestones.close").await;
    let role = Principal::Role(Uuid::new_v4());
    let milestone_id = Uuid::new_v4();

    let policy = grant(
        &pool,
        action.id,
        role,
        PolicyScope::Milestone(milestone_id),
        PermissionLevel::Editor,
    )
    .await;

    let json = serde_json::to_value(&policy).expect("serialize failed");
    assert_eq!(json["permission_level"], "Editor");
    assert_eq!(json["scoped_resource_type"], "Milestone");
    assert_eq!(json["scoped_milestone_id"], milestone_id.to_string());

    let filter = format!(r#"scoped_milestone_id = "{milestone_id}" and principal_type = "Role""#);
    assert_eq!(
        access_policies::count(&pool, &registry, &filter)
            .await
            .expect("Count failed"),
        1
    );

    access_policies::delete(&pool, policy.id)
        .await
        .expect("Delete failed");
    assert_eq!(
        access_policies::count(&pool, &registry, &filter)
            .await
            .expect("Count failed"),
        0
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn test_untrusted_filters_are_rejected(pool: PgPool) {
    let registry = TableKeyRegistry::builtin();

    let injection = access_policies::list(
        &pool,
        &registry,
        r#"id = "x"; DROP TABLE access_policies; --"#,
        ListLimits::default(),
    )
    .await;
    assert!(matches!(
        injection,
        Err(AccessPolicyError::SlashstepQL(SlashstepQLError::InvalidQuery(_)))
    ));

    let literal_key = access_policies::count(&pool, &registry, r#"1 = 1 or id = "x""#).await;
    assert!(matches!(
        literal_key,
        Err(AccessPolicyError::SlashstepQL(SlashstepQLError::InvalidQuery(_)))
    ));

    let unbalanced =
        access_policies::count(&pool, &registry, r#"(principal_type = "User""#).await;
    assert!(matches!(
        unbalanced,
        Err(AccessPolicyError::SlashstepQL(SlashstepQLError::InvalidQuery(_)))
    ));

    // Table still intact.
    assert_eq!(
        access_policies::count(&pool, &registry, "")
            .await
            .expect("Count failed"),
        0
    );
}
