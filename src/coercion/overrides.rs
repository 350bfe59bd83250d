//! Process-wide type override registry

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::LogicalType;

/// Per-table column type overrides.
///
/// Cloning yields another handle to the same registry, so overrides registered through any
/// handle are visible to every connection created afterwards. Table and column names are
/// matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct TypeOverrideTable {
    inner: Arc<RwLock<HashMap<String, HashMap<String, LogicalType>>>>,
}

impl TypeOverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force `table.column` to resolve as `logical_type`
    pub fn set_type(&self, table: &str, column: &str, logical_type: LogicalType) {
        tracing::debug!(table = %table, column = %column, logical_type = %logical_type, "Registering type override");
        self.inner
            .write()
            .entry(table.to_lowercase())
            .or_default()
            .insert(column.to_lowercase(), logical_type);
    }

    pub fn get(&self, table: &str, column: &str) -> Option<LogicalType> {
        self.inner
            .read()
            .get(&table.to_lowercase())
            .and_then(|columns| columns.get(&column.to_lowercase()).copied())
    }

    /// All overrides registered for `table`, keyed by lower-cased column name
    pub fn for_table(&self, table: &str) -> HashMap<String, LogicalType> {
        self.inner
            .read()
            .get(&table.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    pub fn remove(&self, table: &str, column: &str) -> Option<LogicalType> {
        let mut guard = self.inner.write();
        let key = table.to_lowercase();
        let removed = guard
            .get_mut(&key)
            .and_then(|columns| columns.remove(&column.to_lowercase()));
        if guard.get(&key).is_some_and(|columns| columns.is_empty()) {
            guard.remove(&key);
        }
        removed
    }

    pub fn clear_table(&self, table: &str) {
        self.inner.write().remove(&table.to_lowercase());
    }

    pub fn clear_all(&self) {
        self.inner.write().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_case_insensitive() {
        let overrides = TypeOverrideTable::new();
        overrides.set_type("Employees", "HIRE_DATE", LogicalType::Date);

        assert_eq!(overrides.get("employees", "hire_date"), Some(LogicalType::Date));
        assert_eq!(overrides.get("EMPLOYEES", "Hire_Date"), Some(LogicalType::Date));
        assert_eq!(overrides.get("employees", "name"), None);
    }

    #[test]
    fn test_clones_share_registry() {
        let overrides = TypeOverrideTable::new();
        let other = overrides.clone();
        other.set_type("posts", "is_draft", LogicalType::Boolean);

        assert_eq!(overrides.get("posts", "is_draft"), Some(LogicalType::Boolean));
    }

    #[test]
    fn test_remove_and_clear() {
        let overrides = TypeOverrideTable::new();
        overrides.set_type("posts", "a", LogicalType::String);
        overrides.set_type("posts", "b", LogicalType::Integer);
        overrides.set_type("users", "c", LogicalType::Date);

        assert_eq!(overrides.remove("posts", "a"), Some(LogicalType::String));
        assert_eq!(overrides.for_table("posts").len(), 1);

        overrides.clear_table("posts");
        assert!(overrides.for_table("posts").is_empty());
        assert!(!overrides.is_empty());

        overrides.clear_all();
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_remove_last_column_drops_table() {
        let overrides = TypeOverrideTable::new();
        overrides.set_type("posts", "a", LogicalType::String);
        overrides.remove("posts", "a");
        assert!(overrides.is_empty());
    }
}
