//! SQL dialect translation
//!
//! Provides quoting, literal rendering, pagination, DISTINCT rewriting, IN-list chunking,
//! row-write rendering and DDL generation for the engine's dialect.

pub mod binds;
pub mod ddl;
pub mod distinct;
pub mod dml;
pub mod membership;
pub mod pagination;
pub mod quoting;
pub mod sanitize;

pub use binds::{BindCollector, placeholder, to_question_marks};
pub use ddl::{DdlGenerator, IndexDefinition, TableOptions};
pub use distinct::{DistinctRewrite, distinct_with_order};
pub use dml::{RenderedStatement, render_insert, render_update};
pub use membership::{Membership, in_list_binds, in_list_literals, in_list_predicate};
pub use pagination::{ROWNUM_ALIAS, paginate, paginate_raw};
pub use quoting::{quote_literal, quote_value};
pub use sanitize::{
    ORACLE_RESERVED_WORDS, oracle_downcase, quote_column_name, quote_identifier, quote_string,
    quote_table_name, validate_identifier,
};
