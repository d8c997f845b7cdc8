//! # SemaFlow
//!
//! A semantic query compiler: structured requests over a catalog of
//! semantic tables and flows compile to deterministic multi-dialect SQL,
//! optionally executed against a registered backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │           Catalog (tables, flows, data sources)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [validator]
//! ┌─────────────────────────────────────────────────────────┐
//! │            ResolvedRequest (canonical fields)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [plan builder]
//! ┌─────────────────────────────────────────────────────────┐
//! │            Plan (flat / pre-aggregate shape)             │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [renderer]
//! ┌─────────────────────────────────────────────────────────┐
//! │        SQL (duckdb / postgres / bigquery dialect)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [coordinator + registry]
//! ┌─────────────────────────────────────────────────────────┐
//! │          Rows ({qualified_name: value} maps)             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The entry point is [`handle::FlowHandle`]: validated once at
//! construction, then shared freely across threads. `build_sql` is pure
//! and lock-free; `execute` is backend-bound and async.

pub mod backend;
pub mod error;
pub mod exec;
pub mod handle;
pub mod model;
pub mod planner;
pub mod sql;

#[cfg(feature = "api")]
pub mod api;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::backend::{Backend, BackendCapabilities, ConnectionRegistry, DataSource};
    pub use crate::error::{FlowError, FlowResult};
    pub use crate::exec::{QueryOutcome, RowMap};
    pub use crate::handle::{FieldSchema, FlowHandle, FlowSchema, FlowSummary};
    pub use crate::model::{
        Aggregation, Catalog, DataType, Dimension, FilterOp, FlowJoin, JoinKey, JoinKind,
        Measure, MeasureFilter, SemanticFlow, SemanticTable,
    };
    pub use crate::planner::{Filter, OrderItem, QueryRequest, SortDirection};
    pub use crate::sql::{Dialect, SqlDialect};
}

// Also export the most-used types at the crate root.
pub use backend::DataSource;
pub use error::{FlowError, FlowResult};
pub use exec::QueryOutcome;
pub use handle::FlowHandle;
pub use planner::QueryRequest;
pub use sql::Dialect;
