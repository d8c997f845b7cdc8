//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features used here:
//! - ANSI identifier quoting (`"`)
//! - FILTER clause for aggregates
//! - Native ILIKE
//! - Schema-qualified table references (`schema.table`)

use super::helpers;
use super::SqlDialect;

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    // Uses default emit_limit_offset (LIMIT ... OFFSET ...)

    fn supports_aggregate_filter(&self) -> bool {
        true
    }

    fn supports_ilike(&self) -> bool {
        true
    }
}
