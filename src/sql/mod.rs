//! SQL generation module.
//!
//! A type-safe SQL builder that emits multi-dialect SELECT statements:
//!
//! - [`token`] - token types for SQL serialization
//! - [`expr`] - expression AST and builder DSL
//! - [`query`] - SELECT query builder
//! - [`dialect`] - SQL dialect implementations
//! - [`render`] - plan-to-SQL rendering

pub mod dialect;
pub mod expr;
pub mod query;
pub mod render;
pub mod token;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    and_all, avg, col, count, count_distinct, lit_bool, lit_float, lit_int, lit_null, lit_str,
    max, min, or_all, star, sum, table_col, BinaryOperator, Expr, ExprExt, Literal,
};
pub use query::{
    FromItem, Join, JoinType, LimitOffset, OrderByExpr, Query, SelectExpr, SortDir, TableRef,
};
pub use render::{
    filtered_aggregate_disabled, PageCursor, RenderOptions, RenderedQuery, SqlRenderer,
    CURSOR_VERSION, DISABLE_FILTERED_AGG_ENV,
};
pub use token::{Token, TokenStream};
