//! Driver-facing session trait
//!
//! An [`EngineSession`] is one physical connection. It knows nothing about retries or
//! type coercion; it executes what it is given and reports failures as [`SessionError`].

use async_trait::async_trait;

use crate::config::Backend;
use crate::error::SessionError;
use crate::lob::LobData;
use crate::types::EngineValue;

/// Rows returned by a query, with column names as the engine reports them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<EngineValue>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<EngineValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name`, ignoring case
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Value of column `name` in row `row`
    pub fn get(&self, row: usize, name: &str) -> Option<&EngineValue> {
        let index = self.column_index(name)?;
        self.rows.get(row).and_then(|r| r.get(index))
    }

    /// Remove column `name` from the header and every row
    pub fn strip_column(&mut self, name: &str) {
        if let Some(index) = self.column_index(name) {
            self.columns.remove(index);
            for row in &mut self.rows {
                if index < row.len() {
                    row.remove(index);
                }
            }
        }
    }

    /// Append the rows of `other`, which must have the same columns
    pub fn extend(&mut self, other: QueryResult) {
        if self.columns.is_empty() {
            self.columns = other.columns;
        }
        self.rows.extend(other.rows);
    }
}

/// What the engine learned from parsing a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedInfo {
    pub sql: String,
    pub bind_count: usize,
    pub is_query: bool,
}

/// Statements that locate and fill one LOB column of one row.
///
/// `locate_sql` binds the key values; `write_sql` binds the content first and the key
/// values after it.
#[derive(Debug, Clone, PartialEq)]
pub struct LobTarget {
    pub table: String,
    pub column: String,
    pub locate_sql: String,
    pub write_sql: String,
    pub key_binds: Vec<EngineValue>,
}

/// One physical engine connection
#[async_trait]
pub trait EngineSession: Send {
    fn backend(&self) -> Backend;

    async fn open(&mut self) -> Result<(), SessionError>;

    async fn close(&mut self) -> Result<(), SessionError>;

    /// Cheap round trip proving the connection is usable
    async fn ping(&mut self) -> Result<(), SessionError>;

    /// Run a statement, returning the affected row count
    async fn execute(&mut self, sql: &str, binds: &[EngineValue]) -> Result<u64, SessionError>;

    async fn query(&mut self, sql: &str, binds: &[EngineValue])
    -> Result<QueryResult, SessionError>;

    async fn prepare(&mut self, sql: &str) -> Result<PreparedInfo, SessionError>;

    async fn set_autocommit(&mut self, enabled: bool) -> Result<(), SessionError>;

    async fn commit(&mut self) -> Result<(), SessionError>;

    async fn rollback(&mut self) -> Result<(), SessionError>;

    /// Locate the LOB of `target` and write `data` into it.
    ///
    /// Returns how many rows the locate step found; zero means nothing was written.
    async fn write_lob(&mut self, target: &LobTarget, data: &LobData)
    -> Result<u64, SessionError>;

    /// Drop the physical connection and open a new one
    async fn reset(&mut self) -> Result<(), SessionError> {
        let _ = self.close().await;
        self.open().await
    }
}

#[async_trait]
impl<T: EngineSession + ?Sized> EngineSession for Box<T> {
    fn backend(&self) -> Backend {
        (**self).backend()
    }

    async fn open(&mut self) -> Result<(), SessionError> {
        (**self).open().await
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        (**self).close().await
    }

    async fn ping(&mut self) -> Result<(), SessionError> {
        (**self).ping().await
    }

    async fn execute(&mut self, sql: &str, binds: &[EngineValue]) -> Result<u64, SessionError> {
        (**self).execute(sql, binds).await
    }

    async fn query(
        &mut self,
        sql: &str,
        binds: &[EngineValue],
    ) -> Result<QueryResult, SessionError> {
        (**self).query(sql, binds).await
    }

    async fn prepare(&mut self, sql: &str) -> Result<PreparedInfo, SessionError> {
        (**self).prepare(sql).await
    }

    async fn set_autocommit(&mut self, enabled: bool) -> Result<(), SessionError> {
        (**self).set_autocommit(enabled).await
    }

    async fn commit(&mut self) -> Result<(), SessionError> {
        (**self).commit().await
    }

    async fn rollback(&mut self) -> Result<(), SessionError> {
        (**self).rollback().await
    }

    async fn write_lob(
        &mut self,
        target: &LobTarget,
        data: &LobData,
    ) -> Result<u64, SessionError> {
        (**self).write_lob(target, data).await
    }

    async fn reset(&mut self) -> Result<(), SessionError> {
        (**self).reset().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn sample() -> QueryResult {
        QueryResult::new(
            vec!["ID".into(), "NAME".into(), "RAW_RNUM_".into()],
            vec![
                vec![
                    EngineValue::Number(Decimal::from(1)),
                    EngineValue::Varchar("a".into()),
                    EngineValue::Number(Decimal::from(1)),
                ],
                vec![
                    EngineValue::Number(Decimal::from(2)),
                    EngineValue::Varchar("b".into()),
                    EngineValue::Number(Decimal::from(2)),
                ],
            ],
        )
    }

    #[test]
    fn test_query_result_lookup_ignores_case() {
        let result = sample();
        assert_eq!(result.column_index("name"), Some(1));
        assert_eq!(result.get(1, "name"), Some(&EngineValue::Varchar("b".into())));
        assert_eq!(result.get(5, "name"), None);
    }

    #[test]
    fn test_strip_column() {
        let mut result = sample();
        result.strip_column("raw_rnum_");
        assert_eq!(result.columns, vec!["ID", "NAME"]);
        assert!(result.rows.iter().all(|r| r.len() == 2));

        result.strip_column("missing");
        assert_eq!(result.columns.len(), 2);
    }

    #[test]
    fn test_extend_appends_rows() {
        let mut result = QueryResult::default();
        result.extend(sample());
        result.extend(sample());
        assert_eq!(result.len(), 4);
        assert_eq!(result.columns.len(), 3);
    }
}
