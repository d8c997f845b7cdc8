//! Plan building - decides how the SQL for a resolved request is shaped.
//!
//! Two plan shapes exist:
//!
//! - **Flat**: one SELECT over the base table joined with every referenced
//!   alias, grouped on the requested dimensions. Chosen when every filter
//!   targets the base alias.
//! - **PreAggregate**: chosen when any filter targets a joined alias. The
//!   base table is aggregated first in an inner derived query (base-side
//!   filters in its WHERE, joined-side filters behind an EXISTS semi-join),
//!   and the outer query joins the other aliases onto that derived result
//!   for dimension decoration, re-aggregating partials to the requested
//!   grain. This keeps fan-out joins from double-counting and wrong-grain
//!   predicates out of the aggregate.
//!
//! Plan output is a pure function of the validated request and the catalog:
//! the join list, key list, and alias sets all follow declaration order.

use crate::error::{FlowError, FlowResult};
use crate::model::catalog::{FieldRef, FlowContext};
use crate::model::table::Measure;
use crate::planner::resolved::{MeasureKind, ResolvedRequest};

/// Which SQL shape the renderer will emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanShape {
    Flat,
    PreAggregate,
}

/// The renderer's instruction set for one request.
#[derive(Debug, Clone)]
pub struct Plan {
    pub shape: PlanShape,
    /// Non-base aliases joined into the (outer) query, declaration order.
    /// Unreferenced joins are pruned.
    pub joins: Vec<String>,
    /// Pre-aggregate only: aliases materialized inside the EXISTS
    /// subquery, declaration order.
    pub exists_aliases: Vec<String>,
    /// Pre-aggregate only: base-side join-key columns the inner query must
    /// group on and project so the outer query can attach decoration joins.
    pub inner_keys: Vec<String>,
}

/// Builds plans from resolved requests.
pub struct PlanBuilder;

impl PlanBuilder {
    pub fn build(ctx: &FlowContext, request: &ResolvedRequest) -> FlowResult<Plan> {
        let has_joined_filter = request.filters.iter().any(|f| !f.on_base);
        if has_joined_filter {
            Self::build_pre_aggregate(ctx, request)
        } else {
            Ok(Self::build_flat(ctx, request))
        }
    }

    fn build_flat(ctx: &FlowContext, request: &ResolvedRequest) -> Plan {
        let referenced = request.referenced_aliases();
        Plan {
            shape: PlanShape::Flat,
            joins: close_over(ctx, &referenced),
            exists_aliases: Vec::new(),
            inner_keys: Vec::new(),
        }
    }

    fn build_pre_aggregate(ctx: &FlowContext, request: &ResolvedRequest) -> FlowResult<Plan> {
        let base = &request.base_alias;

        // Every aggregate the inner query computes must combine from
        // partials at the outer layer, and must live on the base table.
        for measure in &request.measures {
            let deps: Vec<FieldRef> = match &measure.kind {
                MeasureKind::Aggregate { .. } => vec![measure.field.clone()],
                MeasureKind::Derived { deps, .. } => deps.clone(),
            };
            for dep in deps {
                if dep.alias != *base {
                    return Err(FlowError::PlanInfeasible(format!(
                        "measure '{}' depends on '{}' from a joined table; joined-table \
                         measures cannot be computed under a pre-aggregate plan",
                        measure.field, dep
                    )));
                }
                let Some(Measure::Aggregate { agg, .. }) = ctx.measure(&dep) else {
                    continue;
                };
                if !agg.reaggregates() {
                    return Err(FlowError::PlanInfeasible(format!(
                        "measure '{}' aggregates with '{}', which cannot be recombined \
                         at the requested grain under a pre-aggregate plan",
                        dep, agg
                    )));
                }
            }
        }

        // Dimension decoration joins for the outer query.
        let dim_aliases: Vec<String> = request
            .dimensions
            .iter()
            .map(|d| d.field.alias.clone())
            .collect();
        let joins = close_over(ctx, &dim_aliases);

        // Joined-side filter aliases live inside the EXISTS subquery.
        let filter_aliases: Vec<String> = request
            .filters
            .iter()
            .filter(|f| !f.on_base)
            .map(|f| f.field.alias.clone())
            .collect();
        let exists_aliases = close_over(ctx, &filter_aliases);

        // The inner query groups on the base-side key columns of every
        // decoration join that attaches directly to the base alias.
        let mut inner_keys: Vec<String> = Vec::new();
        for alias in &joins {
            let binding = ctx.binding(alias).expect("planned alias is bound");
            let join = binding.join.as_ref().expect("non-base alias has a join");
            if join.to_alias == *base {
                for key in &join.keys {
                    if !inner_keys.iter().any(|k| k == &key.left) {
                        inner_keys.push(key.left.clone());
                    }
                }
            }
        }

        Ok(Plan {
            shape: PlanShape::PreAggregate,
            joins,
            exists_aliases,
            inner_keys,
        })
    }
}

/// Close a set of aliases over their `to_alias` ancestor chains (a join can
/// only attach to an already-joined alias), then order the result by
/// declaration order. The base alias is never included.
fn close_over(ctx: &FlowContext, aliases: &[String]) -> Vec<String> {
    let base = &ctx.flow.base_alias;
    let mut needed: Vec<String> = Vec::new();
    for alias in aliases {
        if alias == base || needed.iter().any(|a| a == alias) {
            continue;
        }
        needed.push(alias.clone());
        for ancestor in ctx.ancestors(alias) {
            if &ancestor != base && !needed.iter().any(|a| a == &ancestor) {
                needed.push(ancestor);
            }
        }
    }
    ctx.bindings
        .iter()
        .skip(1)
        .map(|b| b.alias.clone())
        .filter(|alias| needed.iter().any(|a| a == alias))
        .collect()
}
