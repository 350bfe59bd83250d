//! Bulk membership predicates
//!
//! The engine rejects IN lists longer than a fixed number of expressions. Longer lists are
//! split into chunks: `IN` becomes an OR of chunked `IN`s and `NOT IN` an AND of chunked
//! `NOT IN`s, which matches exactly the same rows.

use crate::sql::binds::BindCollector;
use crate::sql::quoting::quote_literal;
use crate::types::EngineValue;

/// Whether the predicate tests for membership or its absence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    In,
    NotIn,
}

impl Membership {
    fn keyword(self) -> &'static str {
        match self {
            Membership::In => "IN",
            Membership::NotIn => "NOT IN",
        }
    }

    fn joiner(self) -> &'static str {
        match self {
            Membership::In => " OR ",
            Membership::NotIn => " AND ",
        }
    }

    /// Predicate for an empty list: nothing is in it, everything is not
    fn empty_predicate(self) -> &'static str {
        match self {
            Membership::In => "1=0",
            Membership::NotIn => "1=1",
        }
    }
}

/// Build a membership predicate from already rendered SQL expressions.
///
/// # Example
/// ```
/// use runtara_oracle_compat::sql::{Membership, in_list_predicate};
///
/// let values: Vec<String> = (1..=5).map(|v| v.to_string()).collect();
/// assert_eq!(
///     in_list_predicate("id", &values, Membership::In, 2),
///     "(id IN (1, 2) OR id IN (3, 4) OR id IN (5))"
/// );
/// ```
pub fn in_list_predicate(
    column_sql: &str,
    expressions: &[String],
    membership: Membership,
    limit: usize,
) -> String {
    if expressions.is_empty() {
        return membership.empty_predicate().to_string();
    }

    let chunks: Vec<String> = expressions
        .chunks(limit.max(1))
        .map(|chunk| {
            format!(
                "{} {} ({})",
                column_sql,
                membership.keyword(),
                chunk.join(", ")
            )
        })
        .collect();

    if chunks.len() == 1 {
        chunks.into_iter().next().unwrap_or_default()
    } else {
        format!("({})", chunks.join(membership.joiner()))
    }
}

/// Membership predicate with every value rendered as a literal
pub fn in_list_literals(
    column_sql: &str,
    values: &[EngineValue],
    membership: Membership,
    limit: usize,
) -> String {
    let expressions: Vec<String> = values.iter().map(quote_literal).collect();
    in_list_predicate(column_sql, &expressions, membership, limit)
}

/// Membership predicate with every value bound through `binds`
pub fn in_list_binds(
    column_sql: &str,
    values: &[EngineValue],
    membership: Membership,
    limit: usize,
    binds: &mut BindCollector,
) -> String {
    let expressions: Vec<String> = values.iter().map(|v| binds.push(v.clone())).collect();
    in_list_predicate(column_sql, &expressions, membership, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::collections::HashSet;

    fn numbers(range: std::ops::Range<i64>) -> Vec<EngineValue> {
        range.map(|n| EngineValue::Number(Decimal::from(n))).collect()
    }

    /// Evaluate a rendered predicate of integer literals against `candidate`
    fn evaluate(predicate: &str, candidate: i64) -> bool {
        let body = predicate.trim_start_matches('(').trim_end_matches(')');
        if body.contains(" NOT IN ") {
            body.split(" AND ").all(|chunk| !chunk_contains(chunk, candidate))
        } else {
            body.split(" OR ").any(|chunk| chunk_contains(chunk, candidate))
        }
    }

    fn chunk_contains(chunk: &str, candidate: i64) -> bool {
        let open = chunk.find('(').unwrap();
        let values: HashSet<i64> = chunk[open + 1..]
            .trim_end_matches(')')
            .split(", ")
            .map(|v| v.parse().unwrap())
            .collect();
        values.contains(&candidate)
    }

    #[test]
    fn test_single_chunk_is_plain_in() {
        let predicate = in_list_literals("id", &numbers(1..4), Membership::In, 1000);
        assert_eq!(predicate, "id IN (1, 2, 3)");
    }

    #[test]
    fn test_empty_lists() {
        assert_eq!(in_list_literals("id", &[], Membership::In, 1000), "1=0");
        assert_eq!(in_list_literals("id", &[], Membership::NotIn, 1000), "1=1");
    }

    #[test]
    fn test_chunks_respect_limit() {
        let predicate = in_list_literals("id", &numbers(0..2500), Membership::In, 1000);
        assert_eq!(predicate.matches(" IN (").count(), 3);
        assert_eq!(predicate.matches(" OR ").count(), 2);
        for chunk in predicate.split(" OR ") {
            assert!(chunk.matches(", ").count() < 1000);
        }
    }

    #[test]
    fn test_chunked_in_matches_same_rows() {
        let values = numbers(0..2500);
        let predicate = in_list_literals("id", &values, Membership::In, 1000);
        for candidate in [-1, 0, 999, 1000, 1999, 2000, 2499, 2500, 10_000] {
            assert_eq!(evaluate(&predicate, candidate), (0..2500).contains(&candidate));
        }
    }

    #[test]
    fn test_chunked_not_in_matches_same_rows() {
        let values = numbers(0..2500);
        let predicate = in_list_literals("id", &values, Membership::NotIn, 1000);
        assert!(predicate.starts_with("(id NOT IN ("));
        assert_eq!(predicate.matches(" AND ").count(), 2);
        for candidate in [-1, 0, 1500, 2499, 2500] {
            assert_eq!(evaluate(&predicate, candidate), !(0..2500).contains(&candidate));
        }
    }

    #[test]
    fn test_in_list_binds() {
        let mut binds = BindCollector::new();
        binds.push(EngineValue::Varchar("earlier".into()));
        let predicate = in_list_binds("t.id", &numbers(1..4), Membership::In, 2, &mut binds);
        assert_eq!(predicate, "(t.id IN (:a2, :a3) OR t.id IN (:a4))");
        assert_eq!(binds.len(), 4);
    }
}
