//! ROWNUM pagination
//!
//! ROWNUM is assigned while rows are produced, so `WHERE ROWNUM > n` never matches. The
//! inner query is wrapped twice: once to materialise the row numbers, once to filter on them.
//! The exact shape of the emitted SQL is relied on by callers and must not change.

use crate::error::{AdapterError, Result};

/// Alias of the synthetic row-number column added by [`paginate`]
pub const ROWNUM_ALIAS: &str = "raw_rnum_";

/// Alias of the wrapped inner query
const INNER_ALIAS: &str = "raw_sql_";

/// Wrap `inner` so it returns rows `[offset, offset + limit)`.
///
/// # Example
/// ```
/// use runtara_oracle_compat::sql::paginate;
///
/// assert_eq!(
///     paginate("SELECT * FROM t ORDER BY id", Some(10), Some(20)),
///     "SELECT * FROM (SELECT raw_sql_.*, ROWNUM raw_rnum_ FROM (SELECT * FROM t ORDER BY id) raw_sql_ WHERE ROWNUM <= 30) WHERE raw_rnum_ > 20"
/// );
/// ```
pub fn paginate(inner: &str, limit: Option<u64>, offset: Option<u64>) -> String {
    match (limit, offset) {
        (None, None) => inner.to_string(),
        (Some(limit), offset) => {
            let offset = offset.unwrap_or(0);
            format!(
                "SELECT * FROM (SELECT {alias}.*, ROWNUM {rn} FROM ({inner}) {alias} WHERE ROWNUM <= {upper}) WHERE {rn} > {offset}",
                alias = INNER_ALIAS,
                rn = ROWNUM_ALIAS,
                inner = inner,
                upper = offset.saturating_add(limit),
                offset = offset,
            )
        }
        (None, Some(offset)) => format!(
            "SELECT * FROM (SELECT {alias}.*, ROWNUM {rn} FROM ({inner}) {alias}) WHERE {rn} > {offset}",
            alias = INNER_ALIAS,
            rn = ROWNUM_ALIAS,
            inner = inner,
            offset = offset,
        ),
    }
}

/// [`paginate`] for limit and offset arriving as text.
///
/// Both are coerced to non-negative integers before anything is interpolated; a value that
/// does not coerce is rejected.
pub fn paginate_raw(inner: &str, limit: Option<&str>, offset: Option<&str>) -> Result<String> {
    let limit = limit.map(|v| coerce_count("limit", v)).transpose()?;
    let offset = offset.map(|v| coerce_count("offset", v)).transpose()?;
    Ok(paginate(inner, limit, offset))
}

fn coerce_count(name: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|_| {
        AdapterError::invalid_input(format!(
            "{} must be a non-negative integer, got '{}'",
            name, value
        ))
    })
}
