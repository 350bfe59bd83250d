//! DISTINCT with ORDER BY
//!
//! With DISTINCT the engine requires every ORDER BY expression in the select list. Adding
//! the raw ordering columns would split distinct groups, so each ordering expression is
//! replaced by the first value it takes within its group, computed with a window function.

use std::sync::LazyLock;

use regex::Regex;

static ORDER_DIRECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(ASC|DESC)(\s+NULLS\s+(FIRST|LAST))?\s*$|\s+(NULLS\s+(FIRST|LAST))\s*$")
        .expect("order direction pattern is valid")
});

/// A rewritten DISTINCT select list and the ORDER BY that goes with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinctRewrite {
    /// Original select list followed by the synthetic window columns
    pub select_list: String,
    /// ORDER BY items referencing the synthetic aliases
    pub order_by: Vec<String>,
}

impl DistinctRewrite {
    /// The ORDER BY clause body, empty when there was nothing to order by
    pub fn order_by_clause(&self) -> String {
        self.order_by.join(", ")
    }

    /// A complete `SELECT DISTINCT` over `from`
    pub fn render(&self, from: &str) -> String {
        let mut sql = format!("SELECT DISTINCT {} FROM {}", self.select_list, from);
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by_clause());
        }
        sql
    }
}

/// Synthetic alias for the `index`-th ordering expression
pub fn distinct_alias(index: usize) -> String {
    format!("alias_{}__", index)
}

/// Rewrite `columns` (a select list) and `orders` (ORDER BY items) for use with DISTINCT.
///
/// # Example
/// ```
/// use runtara_oracle_compat::sql::distinct_with_order;
///
/// let rewrite = distinct_with_order("posts.id", &["posts.created_at DESC"]);
/// assert_eq!(
///     rewrite.select_list,
///     "posts.id, FIRST_VALUE(posts.created_at) OVER (PARTITION BY posts.id ORDER BY posts.created_at DESC) AS alias_0__"
/// );
/// assert_eq!(rewrite.order_by, vec!["alias_0__ DESC"]);
/// ```
pub fn distinct_with_order(columns: &str, orders: &[&str]) -> DistinctRewrite {
    let mut select_list = columns.to_string();
    let mut order_by = Vec::new();

    for (index, order) in orders
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .enumerate()
    {
        let (expression, direction) = split_direction(order);
        let alias = distinct_alias(index);
        let window_order = match &direction {
            Some(direction) => format!("{} {}", expression, direction),
            None => expression.to_string(),
        };

        select_list.push_str(&format!(
            ", FIRST_VALUE({}) OVER (PARTITION BY {} ORDER BY {}) AS {}",
            expression, columns, window_order, alias
        ));
        order_by.push(match direction {
            Some(direction) => format!("{} {}", alias, direction),
            None => alias,
        });
    }

    DistinctRewrite {
        select_list,
        order_by,
    }
}

/// Split `expr DESC NULLS LAST` into the expression and its upper-cased direction
fn split_direction(order: &str) -> (&str, Option<String>) {
    match ORDER_DIRECTION.find(order) {
        Some(m) => {
            let direction = order[m.start()..]
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_uppercase();
            (order[..m.start()].trim_end(), Some(direction))
        }
        None => (order, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_without_order() {
        let rewrite = distinct_with_order("a, b", &[]);
        assert_eq!(rewrite.select_list, "a, b");
        assert!(rewrite.order_by.is_empty());
        assert_eq!(rewrite.render("t"), "SELECT DISTINCT a, b FROM t");
    }

    #[test]
    fn test_distinct_multiple_orders() {
        let rewrite = distinct_with_order("dept", &["salary desc", "hired_at", "  "]);
        assert_eq!(
            rewrite.select_list,
            "dept, FIRST_VALUE(salary) OVER (PARTITION BY dept ORDER BY salary DESC) AS alias_0__, \
             FIRST_VALUE(hired_at) OVER (PARTITION BY dept ORDER BY hired_at) AS alias_1__"
        );
        assert_eq!(rewrite.order_by_clause(), "alias_0__ DESC, alias_1__");
    }

    #[test]
    fn test_distinct_keeps_nulls_clause() {
        let rewrite = distinct_with_order("dept", &["bonus ASC NULLS LAST"]);
        assert!(rewrite.select_list.contains("ORDER BY bonus ASC NULLS LAST"));
        assert_eq!(rewrite.order_by, vec!["alias_0__ ASC NULLS LAST"]);
    }

    #[test]
    fn test_distinct_render() {
        let rewrite = distinct_with_order("e.dept_id", &["e.name DESC"]);
        assert_eq!(
            rewrite.render("employees e"),
            "SELECT DISTINCT e.dept_id, FIRST_VALUE(e.name) OVER (PARTITION BY e.dept_id ORDER BY e.name DESC) AS alias_0__ FROM employees e ORDER BY alias_0__ DESC"
        );
    }

    /// Employee fixture: (dept, salary, hired_at), with repeated departments
    const EMPLOYEES: &[(&str, i64, i64)] = &[
        ("eng", 120, 2019),
        ("eng", 150, 2021),
        ("eng", 90, 2015),
        ("ops", 80, 2018),
        ("ops", 110, 2020),
        ("sales", 70, 2022),
    ];

    fn field(row: &(&str, i64, i64), name: &str) -> i64 {
        match name {
            "salary" => row.1,
            "hired_at" => row.2,
            other => panic!("unknown column {}", other),
        }
    }

    /// Evaluate the rewritten select list over the fixture: every window column takes the
    /// first value of its expression within the row's department, then DISTINCT applies
    fn evaluate(rewrite: &DistinctRewrite) -> Vec<Vec<String>> {
        let window = Regex::new(
            r"FIRST_VALUE\((\w+)\) OVER \(PARTITION BY dept ORDER BY (\w+)( DESC)?\)",
        )
        .unwrap();
        let windows: Vec<(String, bool)> = window
            .captures_iter(&rewrite.select_list)
            .map(|c| (c[1].to_string(), c.get(3).is_some()))
            .collect();

        let mut projected: Vec<Vec<String>> = EMPLOYEES
            .iter()
            .map(|row| {
                let mut out = vec![row.0.to_string()];
                for (expr, descending) in &windows {
                    let group = EMPLOYEES.iter().filter(|r| r.0 == row.0).map(|r| field(r, expr));
                    let first = if *descending { group.max() } else { group.min() };
                    out.push(first.unwrap().to_string());
                }
                out
            })
            .collect();
        projected.sort();
        projected.dedup();
        projected
    }

    #[test]
    fn test_distinct_row_count_equals_group_count() {
        let rewrite = distinct_with_order("dept", &["salary DESC", "hired_at"]);
        let rows = evaluate(&rewrite);

        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows,
            vec![
                vec!["eng".to_string(), "150".to_string(), "2015".to_string()],
                vec!["ops".to_string(), "110".to_string(), "2018".to_string()],
                vec!["sales".to_string(), "70".to_string(), "2022".to_string()],
            ]
        );
    }

    #[test]
    fn test_raw_order_columns_would_split_groups() {
        let mut naive: Vec<(&str, i64)> = EMPLOYEES.iter().map(|r| (r.0, r.1)).collect();
        naive.sort();
        naive.dedup();
        assert_eq!(naive.len(), EMPLOYEES.len());
        assert!(evaluate(&distinct_with_order("dept", &["salary"])).len() < naive.len());
    }

    #[test]
    fn test_split_direction_ignores_column_names_containing_keywords() {
        assert_eq!(split_direction("description"), ("description", None));
        assert_eq!(split_direction("t.asc_count"), ("t.asc_count", None));
    }
}
