//! Query planning: request validation and plan shape selection.

pub mod plan;
pub mod resolve;
pub mod resolved;
pub mod types;

pub use plan::{Plan, PlanBuilder, PlanShape};
pub use resolve::{validate_request, Resolver};
pub use resolved::{
    MeasureKind, Pagination, ResolvedDimension, ResolvedFilter, ResolvedMeasure, ResolvedOrder,
    ResolvedRequest,
};
pub use types::{Filter, OrderItem, QueryRequest, SortDirection};
