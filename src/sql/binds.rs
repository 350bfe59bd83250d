//! Positional bind collection
//!
//! Placeholders take the named-numeric form `:a1`, `:a2`, ... numbered once per bound value
//! in statement order.

use crate::types::EngineValue;

/// Prefix of generated placeholder names
pub const BIND_PREFIX: &str = ":a";

/// Collects bind values while a statement is rendered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindCollector {
    values: Vec<EngineValue>,
}

impl BindCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value and return its placeholder
    pub fn push(&mut self, value: EngineValue) -> String {
        self.values.push(value);
        placeholder(self.values.len())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[EngineValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<EngineValue> {
        self.values
    }
}

/// Placeholder for the 1-based bind position `index`
pub fn placeholder(index: usize) -> String {
    format!("{}{}", BIND_PREFIX, index)
}

/// Rewrite `:aN` placeholders to `?` for drivers that only take positional markers.
///
/// Placeholders inside string literals and quoted identifiers are left alone. Returns the
/// rewritten SQL and the bind index each `?` refers to, in order of appearance.
pub fn to_question_marks(sql: &str) -> (String, Vec<usize>) {
    let mut out = String::with_capacity(sql.len());
    let mut order = Vec::new();
    let mut chars = sql.char_indices().peekable();
    let mut quote: Option<char> = None;

    while let Some((i, c)) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    quote = None;
                }
            }
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                out.push(c);
            }
            None if sql[i..].starts_with(BIND_PREFIX) => {
                let digits: String = sql[i + BIND_PREFIX.len()..]
                    .chars()
                    .take_while(|d| d.is_ascii_digit())
                    .collect();
                match digits.parse::<usize>() {
                    Ok(index) => {
                        out.push('?');
                        order.push(index);
                        for _ in 0..BIND_PREFIX.len() - 1 + digits.len() {
                            chars.next();
                        }
                    }
                    Err(_) => out.push(c),
                }
            }
            None => out.push(c),
        }
    }

    (out, order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_placeholders_increment_in_order() {
        let mut binds = BindCollector::new();
        assert_eq!(binds.push(EngineValue::Varchar("a".into())), ":a1");
        assert_eq!(binds.push(EngineValue::Number(Decimal::ONE)), ":a2");
        assert_eq!(binds.push(EngineValue::Null), ":a3");
        assert_eq!(binds.len(), 3);
        assert_eq!(binds.values()[1], EngineValue::Number(Decimal::ONE));
    }

    #[test]
    fn test_to_question_marks() {
        let (sql, order) =
            to_question_marks("UPDATE t SET a = :a1, b = ':a9' WHERE \":a7\" = :a12 AND c = :a2");
        assert_eq!(sql, "UPDATE t SET a = ?, b = ':a9' WHERE \":a7\" = ? AND c = ?");
        assert_eq!(order, vec![1, 12, 2]);
    }

    #[test]
    fn test_to_question_marks_ignores_other_colons() {
        let (sql, order) = to_question_marks("SELECT :abc FROM dual");
        assert_eq!(sql, "SELECT :abc FROM dual");
        assert!(order.is_empty());
    }
}
