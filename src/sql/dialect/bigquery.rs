//! BigQuery SQL dialect.
//!
//! BigQuery differences handled here:
//! - Backtick identifier quoting
//! - No FILTER clause for aggregates (CASE fallback)
//! - No ILIKE (rewritten to `LOWER(x) LIKE LOWER(y)`)
//! - Three-part table references (`project.dataset.table`)

use super::helpers;
use super::SqlDialect;

/// BigQuery SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct BigQuery;

impl SqlDialect for BigQuery {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn supports_aggregate_filter(&self) -> bool {
        false
    }

    fn supports_ilike(&self) -> bool {
        false
    }
}
