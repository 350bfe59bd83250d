//! Identifier shortening
//!
//! The engine rejects schema object names longer than a fixed byte budget. Names that this
//! crate generates (indexes, foreign keys, sequences, triggers) are shortened
//! deterministically so a later DDL statement can rebuild the same name without a lookup
//! table. Names supplied by the caller are never shortened, only checked.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::{AdapterError, Result};

/// Classic engine limit for every identifier kind
pub const DEFAULT_IDENTIFIER_BUDGET: usize = 30;

/// Letter prefixed to digest-form names so they never start with a digit
pub const DIGEST_PREFIX: char = 'i';

/// Fewest hex characters a digest-form name may carry
pub const MIN_DIGEST_HEX: usize = 8;

/// Hex length of a SHA-1 digest
const MAX_DIGEST_HEX: usize = 40;

/// Keywords of the generated index naming convention and their replacements
const FILLER_WORDS: &[(&str, Option<&str>)] =
    &[("index", Some("i")), ("on", None), ("and", None)];

/// Kind of schema object a name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Table,
    Column,
    Index,
    Constraint,
    Sequence,
    Trigger,
}

impl IdentifierKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IdentifierKind::Table => "table",
            IdentifierKind::Column => "column",
            IdentifierKind::Index => "index",
            IdentifierKind::Constraint => "constraint",
            IdentifierKind::Sequence => "sequence",
            IdentifierKind::Trigger => "trigger",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte-length ceiling per identifier kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierBudgets {
    pub table: usize,
    pub column: usize,
    pub index: usize,
    pub constraint: usize,
    pub sequence: usize,
    pub trigger: usize,
}

impl Default for IdentifierBudgets {
    fn default() -> Self {
        Self::uniform(DEFAULT_IDENTIFIER_BUDGET)
    }
}

impl IdentifierBudgets {
    /// Same budget for every kind (128 on engines with long identifiers)
    pub fn uniform(budget: usize) -> Self {
        Self {
            table: budget,
            column: budget,
            index: budget,
            constraint: budget,
            sequence: budget,
            trigger: budget,
        }
    }

    pub fn for_kind(&self, kind: IdentifierKind) -> usize {
        match kind {
            IdentifierKind::Table => self.table,
            IdentifierKind::Column => self.column,
            IdentifierKind::Index => self.index,
            IdentifierKind::Constraint => self.constraint,
            IdentifierKind::Sequence => self.sequence,
            IdentifierKind::Trigger => self.trigger,
        }
    }

    pub fn max(&self) -> usize {
        [
            self.table,
            self.column,
            self.index,
            self.constraint,
            self.sequence,
            self.trigger,
        ]
        .into_iter()
        .max()
        .unwrap_or(DEFAULT_IDENTIFIER_BUDGET)
    }
}

/// Shorten a generated name so it fits `budget` bytes.
///
/// Returns the candidate unchanged when it already fits. Otherwise tries, in order:
/// dropping the naming-convention filler words, truncating every underscore-separated
/// segment to three characters, and finally `i` followed by a SHA-1 hex prefix of the
/// original candidate. The result is a pure function of its inputs.
///
/// # Example
/// ```
/// use runtara_oracle_compat::identifier::shorten;
///
/// let name = shorten("index_users_on_email_address_and_tenant", 30).unwrap();
/// assert_eq!(name, "i_users_email_address_tenant");
/// ```
pub fn shorten(candidate: &str, budget: usize) -> Result<String> {
    if candidate.len() <= budget {
        return Ok(candidate.to_string());
    }

    let segments: Vec<&str> = candidate
        .split('_')
        .filter_map(|segment| {
            match FILLER_WORDS
                .iter()
                .find(|(word, _)| segment.eq_ignore_ascii_case(word))
            {
                Some((_, replacement)) => *replacement,
                None => Some(segment),
            }
        })
        .collect();

    let without_filler = segments.join("_");
    if without_filler.len() <= budget {
        return Ok(without_filler);
    }

    let truncated = segments
        .iter()
        .map(|segment| segment.chars().take(3).collect::<String>())
        .collect::<Vec<_>>()
        .join("_");
    if truncated.len() <= budget {
        return Ok(truncated);
    }

    digest_name(candidate, budget)
}

/// `i` followed by as much of the candidate's SHA-1 hex digest as fits
fn digest_name(candidate: &str, budget: usize) -> Result<String> {
    let hex_len = budget.saturating_sub(1).min(MAX_DIGEST_HEX);
    if hex_len < MIN_DIGEST_HEX {
        return Err(AdapterError::UnresolvableDigest {
            candidate: candidate.to_string(),
            budget,
        });
    }

    let digest = hex::encode(Sha1::digest(candidate.as_bytes()));
    let mut name = String::with_capacity(hex_len + 1);
    name.push(DIGEST_PREFIX);
    name.push_str(&digest[..hex_len]);

    tracing::debug!(candidate = %candidate, shortened = %name, "Identifier shortened to digest form");
    Ok(name)
}

/// Generated name for an index over `columns`
pub fn index_name(table: &str, columns: &[&str], budget: usize) -> Result<String> {
    if columns.is_empty() {
        return Err(AdapterError::validation(format!(
            "Index on '{}' needs at least one column",
            table
        )));
    }
    let candidate = format!("index_{}_on_{}", table, columns.join("_and_"));
    shorten(&candidate, budget)
}

/// Generated name for a foreign key constraint from `table.column`
pub fn foreign_key_name(table: &str, column: &str, budget: usize) -> Result<String> {
    shorten(&format!("{}_{}_fk", table, column), budget)
}

/// Sequence backing the primary key of `table`
pub fn default_sequence_name(table: &str, budget: usize) -> String {
    suffixed_name(table, "_seq", budget)
}

/// Trigger filling the primary key of `table` from its sequence
pub fn default_trigger_name(table: &str, budget: usize) -> String {
    suffixed_name(table, "_pkt", budget)
}

/// Truncate the table part so `table + suffix` fits the budget
fn suffixed_name(table: &str, suffix: &str, budget: usize) -> String {
    let base = unqualified(table);
    let keep = budget.saturating_sub(suffix.len());
    let mut end = keep.min(base.len());
    while !base.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &base[..end], suffix)
}

/// Drop a `schema.` prefix and `@dblink` suffix
fn unqualified(table: &str) -> &str {
    let without_link = table.split('@').next().unwrap_or(table);
    without_link.rsplit('.').next().unwrap_or(without_link)
}

/// Check a caller-supplied name against its kind's budget
pub fn check_identifier(kind: IdentifierKind, name: &str, budgets: &IdentifierBudgets) -> Result<()> {
    let budget = budgets.for_kind(kind);
    if name.len() > budget {
        return Err(AdapterError::IdentifierTooLong {
            kind,
            name: name.to_string(),
            budget,
        });
    }
    Ok(())
}
