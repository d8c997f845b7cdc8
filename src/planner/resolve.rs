//! Request validation - resolves every referenced name against the flow's
//! scope and rewrites the request into its canonical resolved form.
//!
//! The validator stops at the first error. On success every mentioned field
//! carries its `(alias, field)` pair, every measure is tagged aggregate or
//! derived (with its dependency set), and pagination has been checked for
//! shape.

use serde_json::Value;

use crate::error::{FlowError, FlowResult};
use crate::model::catalog::{Catalog, FieldKind, FlowContext};
use crate::model::table::Measure;
use crate::model::types::FilterOp;
use crate::planner::resolved::{
    MeasureKind, Pagination, ResolvedDimension, ResolvedFilter, ResolvedMeasure, ResolvedOrder,
    ResolvedRequest,
};
use crate::planner::types::QueryRequest;

/// Resolves requests against an immutable catalog.
pub struct Resolver<'a> {
    catalog: &'a Catalog,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Validate a request, resolving `request.flow` first.
    pub fn validate(&self, request: &QueryRequest) -> FlowResult<ResolvedRequest> {
        let ctx = self.catalog.flow(&request.flow)?;
        validate_request(ctx, request)
    }
}

/// Validate a request against an already-resolved flow.
pub fn validate_request(
    ctx: &FlowContext,
    request: &QueryRequest,
) -> FlowResult<ResolvedRequest> {
    if request.dimensions.is_empty() && request.measures.is_empty() {
        return Err(FlowError::PlanInfeasible(
            "request selects no dimensions and no measures".into(),
        ));
    }

    let mut dimensions = Vec::with_capacity(request.dimensions.len());
    for raw in &request.dimensions {
        let (field, kind) = ctx.resolve_name(raw)?;
        if kind != FieldKind::Dimension {
            return Err(FlowError::TypeMismatch {
                field: raw.clone(),
                message: "is a measure; request it under 'measures'".into(),
            });
        }
        let dim = ctx
            .dimension(&field)
            .expect("resolved dimension exists on its table");
        dimensions.push(ResolvedDimension {
            field,
            expr: dim.expr.clone(),
        });
    }

    let mut measures = Vec::with_capacity(request.measures.len());
    for raw in &request.measures {
        let (field, kind) = ctx.resolve_name(raw)?;
        if kind != FieldKind::Measure {
            return Err(FlowError::TypeMismatch {
                field: raw.clone(),
                message: "is a dimension; request it under 'dimensions'".into(),
            });
        }
        let measure = ctx
            .measure(&field)
            .expect("resolved measure exists on its table");
        let kind = match measure {
            Measure::Aggregate {
                expr, agg, filter, ..
            } => MeasureKind::Aggregate {
                expr: expr.clone(),
                agg: *agg,
                filter: filter.clone(),
            },
            Measure::Derived { .. } => {
                let derived = ctx
                    .derived(&field)
                    .expect("derived measures are expanded at catalog build");
                MeasureKind::Derived {
                    expr: derived.expr.clone(),
                    deps: derived.deps.clone(),
                }
            }
        };
        measures.push(ResolvedMeasure { field, kind });
    }

    let base_alias = ctx.flow.base_alias.clone();
    let mut filters = Vec::with_capacity(request.filters.len());
    for filter in &request.filters {
        let (field, kind) = ctx.resolve_name(&filter.field)?;
        if kind != FieldKind::Dimension {
            return Err(FlowError::UnsupportedOp {
                field: filter.field.clone(),
                message: "filters may only target dimensions".into(),
            });
        }
        check_filter_value(&filter.field, filter.op, &filter.value)?;
        let dim = ctx
            .dimension(&field)
            .expect("resolved dimension exists on its table");
        let on_base = field.alias == base_alias;
        filters.push(ResolvedFilter {
            field,
            expr: dim.expr.clone(),
            op: filter.op,
            value: filter.value.clone(),
            on_base,
        });
    }

    let mut order = Vec::with_capacity(request.order.len());
    for item in &request.order {
        let (field, _) = ctx.resolve_name(&item.column)?;
        let in_dimensions = dimensions.iter().any(|d| d.field == field);
        let in_measures = measures.iter().any(|m| m.field == field);
        if !in_dimensions && !in_measures {
            return Err(FlowError::UnknownField {
                field: item.column.clone(),
            });
        }
        order.push(ResolvedOrder {
            field,
            direction: item.direction,
            is_measure: in_measures,
        });
    }

    let pagination = check_pagination(request, &order)?;

    Ok(ResolvedRequest {
        flow: ctx.flow.name.clone(),
        data_source: ctx.data_source.clone(),
        base_alias,
        dimensions,
        measures,
        filters,
        order,
        pagination,
    })
}

/// Filter-value shape rules: `in`/`not in` take non-empty scalar sequences,
/// `like`/`ilike` take strings, comparisons take scalars (null only for
/// equality, where it means IS [NOT] NULL).
fn check_filter_value(field: &str, op: FilterOp, value: &Value) -> FlowResult<()> {
    let mismatch = |message: &str| {
        Err(FlowError::TypeMismatch {
            field: field.to_string(),
            message: message.to_string(),
        })
    };
    let is_scalar =
        |v: &Value| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_));

    if op.takes_sequence() {
        return match value {
            Value::Array(items) if items.is_empty() => {
                mismatch("'in'/'not in' require a non-empty sequence")
            }
            Value::Array(items) => {
                if items.iter().all(is_scalar) {
                    Ok(())
                } else {
                    mismatch("'in'/'not in' sequences must contain scalars")
                }
            }
            _ => mismatch("'in'/'not in' require a sequence value"),
        };
    }

    if op.is_pattern() {
        return match value {
            Value::String(_) => Ok(()),
            _ => mismatch("'like'/'ilike' require a string value"),
        };
    }

    match value {
        Value::Null if matches!(op, FilterOp::Eq | FilterOp::Ne) => Ok(()),
        Value::Null => mismatch("null is only comparable with '==' or '!='"),
        v if is_scalar(v) => Ok(()),
        _ => mismatch("comparison operators require a scalar value"),
    }
}

fn check_pagination(
    request: &QueryRequest,
    order: &[ResolvedOrder],
) -> FlowResult<Pagination> {
    let offset_family = request.limit.is_some() || request.offset.is_some();
    let cursor_family = request.page_size.is_some() || request.cursor.is_some();

    if offset_family && cursor_family {
        return Err(FlowError::MalformedPagination(
            "limit/offset and page_size/cursor are mutually exclusive".into(),
        ));
    }
    if !offset_family && !cursor_family {
        return Ok(Pagination::None);
    }
    if offset_family {
        return Ok(Pagination::LimitOffset {
            limit: request.limit,
            offset: request.offset,
        });
    }

    let Some(page_size) = request.page_size else {
        return Err(FlowError::MalformedPagination(
            "a cursor requires page_size".into(),
        ));
    };
    if page_size == 0 {
        return Err(FlowError::MalformedPagination(
            "page_size must be positive".into(),
        ));
    }
    // The cursor order key is the dimension tuple; without dimensions the
    // key is empty and a cursor could never advance.
    if request.dimensions.is_empty() {
        return Err(FlowError::MalformedPagination(
            "cursor pagination requires at least one dimension".into(),
        ));
    }
    if order.iter().any(|o| o.is_measure) {
        return Err(FlowError::MalformedPagination(
            "cursor pagination cannot order by a measure".into(),
        ));
    }
    Ok(Pagination::Cursor {
        page_size,
        cursor: request.cursor.clone(),
    })
}
