//! Database queries for actions.

use sqlx::postgres::PgArguments;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Action, ActionError, NewAction, ACTIONS_TABLE};
use crate::db::{filter_arguments, push_argument, ListLimits};
use crate::slashstepql::{self, CompileOptions, TableKeyRegistry};

const UUID_QUERY_KEYS: &[&str] = &["id", "app_id"];

/// Create an action.
#[tracing::instrument(skip(pool))]
pub async fn create(pool: &PgPool, new_action: &NewAction) -> Result<Action, ActionError> {
    if new_action.name.trim().is_empty() {
        return Err(ActionError::NameRequired);
    }

    sqlx::query_as::<_, Action>(
        r"
        INSERT INTO actions (id, name, display_name, description, app_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, name, display_name, description, app_id
        ",
    )
    .bind(Uuid::now_v7())
    .bind(&new_action.name)
    .bind(&new_action.display_name)
    .bind(&new_action.description)
    .bind(new_action.app_id)
    .fetch_one(pool)
    .await
    .map_err(|err| {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return ActionError::DuplicateName(new_action.name.clone());
            }
        }
        ActionError::Database(err)
    })
}

pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Action, ActionError> {
    sqlx::query_as::<_, Action>(
        "SELECT id, name, display_name, description, app_id FROM actions WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(ActionError::NotFound(id))
}

pub async fn get_by_name(pool: &PgPool, name: &str) -> Result<Action, ActionError> {
    sqlx::query_as::<_, Action>(
        "SELECT id, name, display_name, description, app_id FROM actions WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ActionError::NameNotFound(name.to_string()))
}

/// List actions matching a filter query, ordered by ID.
#[tracing::instrument(skip(pool, registry))]
pub async fn list(
    pool: &PgPool,
    registry: &TableKeyRegistry,
    filter_query: &str,
    limits: ListLimits,
) -> Result<Vec<Action>, ActionError> {
    let compiled =
        slashstepql::compile(registry, ACTIONS_TABLE, filter_query, &limits.compile_options())?;

    let query = format!(
        "SELECT id, name, display_name, description, app_id FROM {ACTIONS_TABLE}{} ORDER BY id{}",
        compiled.where_sql(),
        compiled.pagination_sql()
    );
    let arguments = filter_arguments(&compiled.parameters, bind_string_parameter)?;

    Ok(sqlx::query_as_with::<_, Action, _>(&query, arguments)
        .fetch_all(pool)
        .await?)
}

/// Count actions matching a filter query. `limit` and `offset` are ignored.
#[tracing::instrument(skip(pool, registry))]
pub async fn count(
    pool: &PgPool,
    registry: &TableKeyRegistry,
    filter_query: &str,
) -> Result<i64, ActionError> {
    let compiled = slashstepql::compile(
        registry,
        ACTIONS_TABLE,
        filter_query,
        &CompileOptions {
            ignore_limit: true,
            ignore_offset: true,
            ..CompileOptions::default()
        },
    )?;

    let query = format!("SELECT COUNT(*) FROM {ACTIONS_TABLE}{}", compiled.where_sql());
    let arguments = filter_arguments(&compiled.parameters, bind_string_parameter)?;

    Ok(sqlx::query_scalar_with::<_, i64, _>(&query, arguments)
        .fetch_one(pool)
        .await?)
}

/// Delete an action and, through the foreign key, every policy that references it.
#[tracing::instrument(skip(pool))]
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), ActionError> {
    let result = sqlx::query("DELETE FROM actions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ActionError::NotFound(id));
    }

    tracing::info!(action_id = %id, "Deleted action and its access policies");
    Ok(())
}

fn bind_string_parameter(
    arguments: &mut PgArguments,
    key: &str,
    value: &str,
) -> Result<(), ActionError> {
    if UUID_QUERY_KEYS.contains(&key) {
        let id = Uuid::parse_str(value).map_err(|_| ActionError::InvalidUuid {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        push_argument(arguments, id)?;
    } else {
        push_argument(arguments, value.to_string())?;
    }

    Ok(())
}
