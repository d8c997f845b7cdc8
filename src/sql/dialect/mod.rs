//! SQL dialect definitions and formatting rules.
//!
//! A trait-based abstraction over the dialect differences the renderer
//! must care about:
//!
//! - Identifier quoting: `"` (Postgres/DuckDB) vs `` ` `` (BigQuery)
//! - FILTER (WHERE ...) support for aggregates
//! - Native ILIKE vs the `LOWER(x) LIKE LOWER(y)` rewrite
//!
//! The dialect is inferred from the data source a flow is bound to; it is
//! never user-specified.

mod bigquery;
mod duckdb;
pub mod helpers;
mod postgres;

pub use bigquery::BigQuery;
pub use duckdb::DuckDb;
pub use postgres::Postgres;

use serde::{Deserialize, Serialize};

use super::token::TokenStream;

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal. All three dialects use single quotes with
    /// `''` escaping.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str;

    /// Emit the LIMIT/OFFSET clause.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_standard(limit, offset)
    }

    /// Whether this dialect supports `AGG(x) FILTER (WHERE ...)`.
    /// Without it the renderer falls back to `AGG(CASE WHEN ... THEN x END)`.
    fn supports_aggregate_filter(&self) -> bool {
        false
    }

    /// Whether this dialect has a native ILIKE operator.
    /// Without it ILIKE is rewritten to `LOWER(x) LIKE LOWER(y)`.
    fn supports_ilike(&self) -> bool {
        false
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    DuckDb,
    Postgres,
    BigQuery,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::DuckDb => &DuckDb,
            Dialect::Postgres => &Postgres,
            Dialect::BigQuery => &BigQuery,
        }
    }
}

// Implement SqlDialect for the enum by delegating to the concrete types.
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn supports_aggregate_filter(&self) -> bool {
        self.dialect().supports_aggregate_filter()
    }

    fn supports_ilike(&self) -> bool {
        self.dialect().supports_ilike()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}
