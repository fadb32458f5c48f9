//! Action catalog.
//!
//! Actions are the operations access policies grant permission over, such as
//! `slashstep.accessPolicies.list`. Deleting an action deletes every policy
//! that references it.

pub mod builtin;
pub mod queries;


use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::slashstepql::SlashstepQLError;

pub use builtin::{ensure_builtin_actions, grant_bootstrap_admin, BUILTIN_ACTIONS};
pub use queries::{count, create, delete, get_by_id, get_by_name, list};

pub const ACTIONS_TABLE: &str = "actions";

/// Keys a filter query may reference on [`ACTIONS_TABLE`].
pub const ALLOWED_QUERY_KEYS: &[&str] = &["id", "name", "display_name", "description", "app_id"];

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Action {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub app_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewAction {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub app_id: Option<Uuid>,
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Couldn't find an action with ID \"{0}\"")]
    NotFound(Uuid),

    #[error("Couldn't find an action named \"{0}\"")]
    NameNotFound(String),

    #[error("An action named \"{0}\" already exists")]
    DuplicateName(String),

    #[error("Action name is required")]
    NameRequired,

    #[error("Invalid UUID for {key}: {value}")]
    InvalidUuid { key: String, value: String },

    #[error(transparent)]
    SlashstepQL(#[from] SlashstepQLError),

    #[error(transparent)]
    AccessPolicy(#[from] crate::access_policies::AccessPolicyError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
