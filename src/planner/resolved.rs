//! Resolved request types - the validator's output.
//!
//! Every field reference has been rewritten to its canonical
//! `(alias, field)` pair, measures are tagged aggregate or derived, and
//! filters know which side of the flow they target.

use serde_json::Value;

use crate::model::catalog::FieldRef;
use crate::model::table::MeasureFilter;
use crate::model::types::{Aggregation, FilterOp};
use crate::planner::types::SortDirection;

/// A requested dimension with its physical expression.
#[derive(Debug, Clone)]
pub struct ResolvedDimension {
    pub field: FieldRef,
    /// Physical column or expression on the owning table.
    pub expr: String,
}

/// How a requested measure computes.
#[derive(Debug, Clone)]
pub enum MeasureKind {
    /// Aggregation over a physical expression, optionally filtered.
    Aggregate {
        expr: String,
        agg: Aggregation,
        filter: Option<MeasureFilter>,
    },
    /// Expression over aggregate measures (already expanded by the catalog).
    Derived { expr: String, deps: Vec<FieldRef> },
}

/// A requested measure.
#[derive(Debug, Clone)]
pub struct ResolvedMeasure {
    pub field: FieldRef,
    pub kind: MeasureKind,
}

impl ResolvedMeasure {
    pub fn is_derived(&self) -> bool {
        matches!(self.kind, MeasureKind::Derived { .. })
    }
}

/// A validated filter with its target's physical expression attached.
#[derive(Debug, Clone)]
pub struct ResolvedFilter {
    pub field: FieldRef,
    pub expr: String,
    pub op: FilterOp,
    pub value: Value,
    /// Whether the filter targets the flow's base alias. Joined-side
    /// filters force the pre-aggregate plan.
    pub on_base: bool,
}

/// A validated ORDER BY entry.
#[derive(Debug, Clone)]
pub struct ResolvedOrder {
    pub field: FieldRef,
    pub direction: SortDirection,
    pub is_measure: bool,
}

/// Validated pagination mode. The two families are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pagination {
    None,
    LimitOffset {
        limit: Option<u64>,
        offset: Option<u64>,
    },
    Cursor {
        page_size: u64,
        cursor: Option<String>,
    },
}

impl Pagination {
    pub fn is_cursor(&self) -> bool {
        matches!(self, Pagination::Cursor { .. })
    }
}

/// The fully validated request handed to the plan builder and renderer.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub flow: String,
    pub data_source: String,
    pub base_alias: String,
    pub dimensions: Vec<ResolvedDimension>,
    pub measures: Vec<ResolvedMeasure>,
    pub filters: Vec<ResolvedFilter>,
    pub order: Vec<ResolvedOrder>,
    pub pagination: Pagination,
}

impl ResolvedRequest {
    /// Aliases referenced by the projection, filters, and derived
    /// dependencies, in first-use order.
    pub fn referenced_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = Vec::new();
        let mut push = |alias: &str| {
            if !aliases.iter().any(|a| a == alias) {
                aliases.push(alias.to_string());
            }
        };
        for dim in &self.dimensions {
            push(&dim.field.alias);
        }
        for measure in &self.measures {
            push(&measure.field.alias);
            if let MeasureKind::Derived { deps, .. } = &measure.kind {
                for dep in deps {
                    push(&dep.alias);
                }
            }
        }
        for filter in &self.filters {
            push(&filter.field.alias);
        }
        aliases
    }
}
