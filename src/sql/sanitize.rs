//! SQL Identifier Sanitization Utilities
//!
//! Quotes identifiers only when the engine would otherwise fold or reject them, and escapes
//! string literals.

use std::sync::LazyLock;

use regex::Regex;

/// Words the engine refuses as unquoted identifiers
pub const ORACLE_RESERVED_WORDS: &[&str] = &[
    "ACCESS",
    "ADD",
    "ALL",
    "ALTER",
    "AND",
    "ANY",
    "AS",
    "ASC",
    "AUDIT",
    "BETWEEN",
    "BY",
    "CHAR",
    "CHECK",
    "CLUSTER",
    "COLUMN",
    "COMMENT",
    "COMPRESS",
    "CONNECT",
    "CREATE",
    "CURRENT",
    "DATE",
    "DECIMAL",
    "DEFAULT",
    "DELETE",
    "DESC",
    "DISTINCT",
    "DROP",
    "ELSE",
    "EXCLUSIVE",
    "EXISTS",
    "FILE",
    "FLOAT",
    "FOR",
    "FROM",
    "GRANT",
    "GROUP",
    "HAVING",
    "IDENTIFIED",
    "IMMEDIATE",
    "IN",
    "INCREMENT",
    "INDEX",
    "INITIAL",
    "INSERT",
    "INTEGER",
    "INTERSECT",
    "INTO",
    "IS",
    "LEVEL",
    "LIKE",
    "LOCK",
    "LONG",
    "MAXEXTENTS",
    "MINUS",
    "MLSLABEL",
    "MODE",
    "MODIFY",
    "NOAUDIT",
    "NOCOMPRESS",
    "NOT",
    "NOWAIT",
    "NULL",
    "NUMBER",
    "OF",
    "OFFLINE",
    "ON",
    "ONLINE",
    "OPTION",
    "OR",
    "ORDER",
    "PCTFREE",
    "PRIOR",
    "PRIVILEGES",
    "PUBLIC",
    "RAW",
    "RENAME",
    "RESOURCE",
    "REVOKE",
    "ROW",
    "ROWID",
    "ROWNUM",
    "ROWS",
    "SELECT",
    "SESSION",
    "SET",
    "SHARE",
    "SIZE",
    "SMALLINT",
    "START",
    "SUCCESSFUL",
    "SYNONYM",
    "SYSDATE",
    "TABLE",
    "THEN",
    "TO",
    "TRIGGER",
    "UID",
    "UNION",
    "UNIQUE",
    "UPDATE",
    "USER",
    "VALIDATE",
    "VALUES",
    "VARCHAR",
    "VARCHAR2",
    "VIEW",
    "WHENEVER",
    "WHERE",
    "WITH",
];

static SIMPLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_$#]*$").expect("simple name pattern is valid")
});

pub fn is_reserved_word(name: &str) -> bool {
    ORACLE_RESERVED_WORDS.contains(&name.to_uppercase().as_str())
}

/// Wrap an identifier in double quotes, doubling embedded quotes
pub fn quote_identifier(identifier: &str) -> String {
    let escaped = identifier.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Quote a column name the way the engine needs to see it
///
/// Simple names in a single case are left bare, since the engine folds them to upper case
/// anyway. Reserved words are quoted in upper case, which is how the engine stores them.
/// Everything else is quoted as given so the case survives.
///
/// # Example
/// ```
/// use runtara_oracle_compat::sql::quote_column_name;
///
/// assert_eq!(quote_column_name("first_name"), "first_name");
/// assert_eq!(quote_column_name("level"), "\"LEVEL\"");
/// assert_eq!(quote_column_name("firstName"), "\"firstName\"");
/// ```
pub fn quote_column_name(name: &str) -> String {
    let single_case = name == name.to_lowercase() || name == name.to_uppercase();
    if SIMPLE_NAME.is_match(name) && single_case {
        if is_reserved_word(name) {
            quote_identifier(&name.to_uppercase())
        } else {
            name.to_string()
        }
    } else {
        quote_identifier(name)
    }
}

/// Quote a possibly qualified table name: `schema.table@dblink`
///
/// The database link part is passed through unchanged.
pub fn quote_table_name(name: &str) -> String {
    let (object, link) = match name.split_once('@') {
        Some((object, link)) => (object, Some(link)),
        None => (name, None),
    };

    let quoted = match object.split_once('.') {
        Some((schema, table)) => {
            format!("{}.{}", quote_column_name(schema), quote_column_name(table))
        }
        None => quote_column_name(object),
    };

    match link {
        Some(link) => format!("{}@{}", quoted, link),
        None => quoted,
    }
}

/// Escape a string for inclusion between single quotes
pub fn quote_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// A complete single-quoted string literal
pub fn string_literal(value: &str) -> String {
    format!("'{}'", quote_string(value))
}

/// Lower-case a name the engine reported in its folded upper case; mixed case is kept
pub fn oracle_downcase(name: &str) -> String {
    if name == name.to_uppercase() {
        name.to_lowercase()
    } else {
        name.to_string()
    }
}

/// Validate a table or column name supplied for DDL
///
/// Rules:
/// - Must start with a letter
/// - Can only contain letters, numbers, `_`, `$` and `#`
/// - Cannot be a reserved word
/// - Cannot be one of `reserved_columns`
///
/// # Example
/// ```
/// use runtara_oracle_compat::sql::validate_identifier;
///
/// assert!(validate_identifier("products", &[]).is_ok());
/// assert!(validate_identifier("select", &[]).is_err());
/// assert!(validate_identifier("id", &["id"]).is_err());
/// ```
pub fn validate_identifier(name: &str, reserved_columns: &[&str]) -> Result<(), String> {
    if name.is_empty() {
        return Err("Identifier cannot be empty".to_string());
    }

    if !SIMPLE_NAME.is_match(name) {
        return Err(format!(
            "Identifier '{}' is invalid. Must start with a letter and contain only letters, numbers, '_', '$' and '#'.",
            name
        ));
    }

    if is_reserved_word(name) {
        return Err(format!(
            "Identifier '{}' is a reserved word and cannot be used.",
            name
        ));
    }

    if reserved_columns
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
    {
        return Err(format!(
            "Column name '{}' is reserved and cannot be used.",
            name
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // quote_column_name Tests
    // =========================================================================

    #[test]
    fn test_quote_column_name_simple_names_stay_bare() {
        assert_eq!(quote_column_name("first_name"), "first_name");
        assert_eq!(quote_column_name("FIRST_NAME"), "FIRST_NAME");
        assert_eq!(quote_column_name("col$1"), "col$1");
    }

    #[test]
    fn test_quote_column_name_reserved_words_upper_cased() {
        assert_eq!(quote_column_name("level"), "\"LEVEL\"");
        assert_eq!(quote_column_name("DATE"), "\"DATE\"");
        assert_eq!(quote_column_name("comment"), "\"COMMENT\"");
    }

    #[test]
    fn test_quote_column_name_preserves_mixed_case() {
        assert_eq!(quote_column_name("firstName"), "\"firstName\"");
        assert_eq!(quote_column_name("Level"), "\"Level\"");
    }

    #[test]
    fn test_quote_column_name_special_characters() {
        assert_eq!(quote_column_name("my col"), "\"my col\"");
        assert_eq!(quote_column_name("1st"), "\"1st\"");
        assert_eq!(quote_column_name("_hidden"), "\"_hidden\"");
        assert_eq!(quote_column_name("a\"b"), "\"a\"\"b\"");
    }

    // =========================================================================
    // quote_table_name Tests
    // =========================================================================

    #[test]
    fn test_quote_table_name_qualified() {
        assert_eq!(quote_table_name("employees"), "employees");
        assert_eq!(quote_table_name("hr.employees"), "hr.employees");
        assert_eq!(quote_table_name("hr.Employees"), "hr.\"Employees\"");
        assert_eq!(quote_table_name("hr.employees@remote.db"), "hr.employees@remote.db");
        assert_eq!(quote_table_name("order@link"), "\"ORDER\"@link");
    }

    // =========================================================================
    // Literal Tests
    // =========================================================================

    #[test]
    fn test_quote_string() {
        assert_eq!(quote_string("O'Brien"), "O''Brien");
        assert_eq!(string_literal("it's"), "'it''s'");
        assert_eq!(string_literal(""), "''");
    }

    #[test]
    fn test_oracle_downcase() {
        assert_eq!(oracle_downcase("EMPLOYEES"), "employees");
        assert_eq!(oracle_downcase("MixedCase"), "MixedCase");
        assert_eq!(oracle_downcase("lower"), "lower");
    }

    // =========================================================================
    // validate_identifier Tests
    // =========================================================================

    #[test]
    fn test_validate_identifier_valid() {
        assert!(validate_identifier("products", &[]).is_ok());
        assert!(validate_identifier("Products", &[]).is_ok());
        assert!(validate_identifier("my_table_123", &[]).is_ok());
        assert!(validate_identifier("acct$", &[]).is_ok());
    }

    #[test]
    fn test_validate_identifier_invalid() {
        assert!(validate_identifier("", &[]).unwrap_err().contains("cannot be empty"));
        assert!(validate_identifier("1products", &[]).is_err());
        assert!(validate_identifier("_products", &[]).is_err());
        assert!(validate_identifier("my-table", &[]).is_err());
        assert!(validate_identifier("schema.table", &[]).is_err());
    }

    #[test]
    fn test_validate_identifier_reserved() {
        assert!(validate_identifier("select", &[]).unwrap_err().contains("reserved word"));
        assert!(validate_identifier("rownum", &[]).is_err());
        assert!(validate_identifier("ID", &["id"]).is_err());
    }

    #[test]
    fn test_reserved_words_contains_common_keywords() {
        assert!(ORACLE_RESERVED_WORDS.contains(&"SELECT"));
        assert!(ORACLE_RESERVED_WORDS.contains(&"ROWNUM"));
        assert!(ORACLE_RESERVED_WORDS.contains(&"LEVEL"));
        assert!(ORACLE_RESERVED_WORDS.len() > 100);
    }
}
