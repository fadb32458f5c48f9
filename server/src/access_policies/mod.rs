//! Access policies.
//!
//! A policy grants a principal (user, group, or role) a permission level for
//! one action at one scope (the instance, a workspace, a project, an item, …).
//!
//! - [`queries`]: create/list/count/get/update/delete against `PostgreSQL`
//! - [`resolver`]: deepest-scope resolution and level checks
//! - [`Principal`]: `check_permissions`/`verify_permissions` for handlers

pub mod error;
pub mod models;
pub mod principal;
pub mod queries;
pub mod resolver;


pub use error::{AccessPolicyError, PermissionError};
pub use models::*;
pub use principal::Principal;
pub use queries::{
    count, create, delete, get_by_id, list, list_for_principal, update, ALLOWED_QUERY_KEYS,
    DEFAULT_ACCESS_POLICY_LIST_LIMIT, HYDRATED_ACCESS_POLICIES_TABLE,
};
pub use resolver::{check_level, resolve_deepest_scope, select_deepest, verify_permission};
