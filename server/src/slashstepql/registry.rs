//! Per-table allow-lists of filterable keys.

use std::collections::{HashMap, HashSet};

use crate::{access_policies, actions};

/// Maps a table (or view) name to the keys a filter query may reference.
///
/// Passed explicitly to [`super::compile`] so deployments and tests can extend
/// or replace the allow-lists without touching global state.
#[derive(Debug, Clone, Default)]
pub struct TableKeyRegistry {
    tables: HashMap<String, HashSet<String>>,
}

impl TableKeyRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the tables this server exposes to filter queries.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            access_policies::HYDRATED_ACCESS_POLICIES_TABLE,
            access_policies::ALLOWED_QUERY_KEYS.iter().copied(),
        );
        registry.register(
            actions::ACTIONS_TABLE,
            actions::ALLOWED_QUERY_KEYS.iter().copied(),
        );
        registry
    }

    /// Add keys to a table's allow-list, creating the entry if needed.
    pub fn register<I, S>(&mut self, table_name: &str, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables
            .entry(table_name.to_string())
            .or_default()
            .extend(keys.into_iter().map(Into::into));
        self
    }

    /// Allowed keys for a table, if the table is registered.
    #[must_use]
    pub fn allowed_keys(&self, table_name: &str) -> Option<&HashSet<String>> {
        self.tables.get(table_name)
    }

    #[must_use]
    pub fn is_allowed(&self, table_name: &str, key: &str) -> bool {
        self.allowed_keys(table_name)
            .is_some_and(|keys| keys.contains(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_extends_existing_table() {
        let mut registry = TableKeyRegistry::new();
        registry.register("widgets", ["id"]);
        registry.register("widgets", ["name".to_string()]);

        assert!(registry.is_allowed("widgets", "id"));
        assert!(registry.is_allowed("widgets", "name"));
        assert!(!registry.is_allowed("widgets", "size"));
        assert!(!registry.is_allowed("gadgets", "id"));
    }

    #[test]
    fn test_builtin_covers_policy_and_action_tables() {
        let registry = TableKeyRegistry::builtin();

        assert!(registry.is_allowed("hydrated_access_policies", "action_id"));
        assert!(registry.is_allowed("hydrated_access_policies", "scoped_item_id"));
        assert!(registry.is_allowed("hydrated_access_policies", "permission_level"));
        assert!(registry.is_allowed("actions", "name"));
        assert!(!registry.is_allowed("actions", "principal_user_id"));
    }
}
