//! Database queries for access policies.

use sqlx::postgres::PgArguments;
use sqlx::PgPool;
use uuid::Uuid;

use super::error::AccessPolicyError;
use super::models::{
    AccessPolicy, AccessPolicyUpdate, HydratedAccessPolicy, InheritanceLevel, NewAccessPolicy,
    PermissionLevel, PrincipalType, ScopedResourceType,
};
use super::principal::Principal;
use crate::db::{filter_arguments, push_argument, ListLimits, DEFAULT_LIST_LIMIT};
use crate::slashstepql::{self, CompileOptions, TableKeyRegistry};

/// Read model that `list` and `count` filter against.
pub const HYDRATED_ACCESS_POLICIES_TABLE: &str = "hydrated_access_policies";

pub const DEFAULT_ACCESS_POLICY_LIST_LIMIT: i64 = DEFAULT_LIST_LIMIT;

/// Keys a filter query may reference on [`HYDRATED_ACCESS_POLICIES_TABLE`].
pub const ALLOWED_QUERY_KEYS: &[&str] = &[
    "id",
    "action_id",
    "action_name",
    "action_display_name",
    "permission_level",
    "inheritance_level",
    "principal_type",
    "principal_user_id",
    "principal_group_id",
    "principal_role_id",
    "scoped_resource_type",
    "scoped_workspace_id",
    "scoped_project_id",
    "scoped_item_id",
    "scoped_action_id",
    "scoped_role_id",
    "scoped_group_id",
    "scoped_user_id",
    "scoped_app_id",
    "scoped_milestone_id",
];

const UUID_QUERY_KEYS: &[&str] = &[
    "id",
    "action_id",
    "principal_user_id",
    "principal_group_id",
    "principal_role_id",
    "scoped_workspace_id",
    "scoped_project_id",
    "scoped_item_id",
    "scoped_action_id",
    "scoped_role_id",
    "scoped_group_id",
    "scoped_user_id",
    "scoped_app_id",
    "scoped_milestone_id",
];

const ACCESS_POLICY_COLUMNS: &str = r"
    id, action_id, permission_level, inheritance_level,
    principal_type, principal_user_id, principal_group_id, principal_role_id,
    scoped_resource_type, scoped_workspace_id, scoped_project_id, scoped_item_id,
    scoped_action_id, scoped_role_id, scoped_group_id, scoped_user_id,
    scoped_app_id, scoped_milestone_id
";

/// Create an access policy.
///
/// Duplicate principal/action/scope combinations are allowed.
#[tracing::instrument(skip(pool))]
pub async fn create(
    pool: &PgPool,
    new_policy: &NewAccessPolicy,
) -> Result<AccessPolicy, AccessPolicyError> {
    let validated = new_policy.validate()?;
    let id = Uuid::now_v7();

    let query = format!(
        r"
        INSERT INTO access_policies ({ACCESS_POLICY_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        RETURNING {ACCESS_POLICY_COLUMNS}
        "
    );

    let policy = sqlx::query_as::<_, AccessPolicy>(&query)
        .bind(id)
        .bind(validated.action_id)
        .bind(validated.permission_level)
        .bind(validated.inheritance_level)
        .bind(validated.principal.principal_type())
        .bind(new_policy.principal_user_id)
        .bind(new_policy.principal_group_id)
        .bind(new_policy.principal_role_id)
        .bind(validated.scope.resource_type())
        .bind(new_policy.scoped_workspace_id)
        .bind(new_policy.scoped_project_id)
        .bind(new_policy.scoped_item_id)
        .bind(new_policy.scoped_action_id)
        .bind(new_policy.scoped_role_id)
        .bind(new_policy.scoped_group_id)
        .bind(new_policy.scoped_user_id)
        .bind(new_policy.scoped_app_id)
        .bind(new_policy.scoped_milestone_id)
        .fetch_one(pool)
        .await
        .map_err(|err| {
            if let sqlx::Error::Database(db_err) = &err {
                if db_err.is_foreign_key_violation() {
                    return AccessPolicyError::ActionNotFound(validated.action_id);
                }
            }
            AccessPolicyError::Database(err)
        })?;

    tracing::debug!(
        policy_id = %policy.id,
        principal = ?validated.principal,
        scope = ?validated.scope,
        "Created access policy"
    );

    Ok(policy)
}

/// Get an access policy by ID.
pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<AccessPolicy, AccessPolicyError> {
    sqlx::query_as::<_, AccessPolicy>(&format!(
        "SELECT {ACCESS_POLICY_COLUMNS} FROM access_policies WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AccessPolicyError::NotFound(id))
}

/// List hydrated access policies matching a filter query, ordered by ID.
#[tracing::instrument(skip(pool, registry))]
pub async fn list(
    pool: &PgPool,
    registry: &TableKeyRegistry,
    filter_query: &str,
    limits: ListLimits,
) -> Result<Vec<HydratedAccessPolicy>, AccessPolicyError> {
    fetch_hydrated(pool, registry, filter_query, &limits.compile_options()).await
}

async fn fetch_hydrated(
    pool: &PgPool,
    registry: &TableKeyRegistry,
    filter_query: &str,
    options: &CompileOptions,
) -> Result<Vec<HydratedAccessPolicy>, AccessPolicyError> {
    let compiled =
        slashstepql::compile(registry, HYDRATED_ACCESS_POLICIES_TABLE, filter_query, options)?;

    let query = format!(
        "SELECT * FROM {HYDRATED_ACCESS_POLICIES_TABLE}{} ORDER BY id{}",
        compiled.where_sql(),
        compiled.pagination_sql()
    );
    let arguments = filter_arguments(&compiled.parameters, bind_string_parameter)?;

    let policies = sqlx::query_as_with::<_, HydratedAccessPolicy, _>(&query, arguments)
        .fetch_all(pool)
        .await?;

    Ok(policies)
}

/// Count access policies matching a filter query. `limit` and `offset` are ignored.
#[tracing::instrument(skip(pool, registry))]
pub async fn count(
    pool: &PgPool,
    registry: &TableKeyRegistry,
    filter_query: &str,
) -> Result<i64, AccessPolicyError> {
    let compiled = slashstepql::compile(
        registry,
        HYDRATED_ACCESS_POLICIES_TABLE,
        filter_query,
        &CompileOptions {
            ignore_limit: true,
            ignore_offset: true,
            ..CompileOptions::default()
        },
    )?;

    let query = format!(
        "SELECT COUNT(*) FROM {HYDRATED_ACCESS_POLICIES_TABLE}{}",
        compiled.where_sql()
    );
    let arguments = filter_arguments(&compiled.parameters, bind_string_parameter)?;

    let count = sqlx::query_scalar_with::<_, i64, _>(&query, arguments)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Replace a policy's permission and/or inheritance level.
#[tracing::instrument(skip(pool))]
pub async fn update(
    pool: &PgPool,
    id: Uuid,
    changes: AccessPolicyUpdate,
) -> Result<AccessPolicy, AccessPolicyError> {
    sqlx::query_as::<_, AccessPolicy>(&format!(
        r"
        UPDATE access_policies
        SET permission_level = COALESCE($2, permission_level),
            inheritance_level = COALESCE($3, inheritance_level)
        WHERE id = $1
        RETURNING {ACCESS_POLICY_COLUMNS}
        "
    ))
    .bind(id)
    .bind(changes.permission_level)
    .bind(changes.inheritance_level)
    .fetch_optional(pool)
    .await?
    .ok_or(AccessPolicyError::NotFound(id))
}

/// Delete an access policy.
#[tracing::instrument(skip(pool))]
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AccessPolicyError> {
    let result = sqlx::query("DELETE FROM access_policies WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AccessPolicyError::NotFound(id));
    }

    Ok(())
}

/// List every policy a principal holds for an action, optionally narrowed by
/// an extra filter expression.
///
/// Unpaginated: `limit` and `offset` in `extra_filter` are ignored.
pub async fn list_for_principal(
    pool: &PgPool,
    registry: &TableKeyRegistry,
    principal: Principal,
    action_id: Uuid,
    extra_filter: Option<&str>,
) -> Result<Vec<HydratedAccessPolicy>, AccessPolicyError> {
    let mut filter_query = format!(
        "action_id = {} and {} = {}",
        slashstepql::quote(&action_id.to_string()),
        principal.filter_key(),
        slashstepql::quote(&principal.id().to_string())
    );
    if let Some(extra) = extra_filter {
        filter_query.push_str(" and (");
        filter_query.push_str(extra);
        filter_query.push(')');
    }

    fetch_hydrated(
        pool,
        registry,
        &filter_query,
        &CompileOptions {
            ignore_limit: true,
            ignore_offset: true,
            ..CompileOptions::default()
        },
    )
    .await
}

/// Bind a string filter value with the column's database type.
fn bind_string_parameter(
    arguments: &mut PgArguments,
    key: &str,
    value: &str,
) -> Result<(), AccessPolicyError> {
    if UUID_QUERY_KEYS.contains(&key) {
        let id = Uuid::parse_str(value).map_err(|_| AccessPolicyError::InvalidUuid {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        push_argument(arguments, id)?;
        return Ok(());
    }

    match key {
        "permission_level" => push_argument(arguments, value.parse::<PermissionLevel>()?)?,
        "inheritance_level" => push_argument(arguments, value.parse::<InheritanceLevel>()?)?,
        "principal_type" => push_argument(arguments, value.parse::<PrincipalType>()?)?,
        "scoped_resource_type" => {
            push_argument(arguments, value.parse::<ScopedResourceType>()?)?
        }
        _ => push_argument(arguments, value.to_string())?,
    }

    Ok(())
}
