//! Type coercion engine
//!
//! Decides, per column, which logical type a raw engine type represents and casts values
//! in both directions.

pub mod cast;
pub mod overrides;
pub mod resolve;

pub use cast::{Caster, parse_boolean};
pub use overrides::TypeOverrideTable;
pub use resolve::{TypeResolver, resolve_type};
