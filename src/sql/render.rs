//! SQL rendering - turns a resolved request plus its plan into a SQL
//! string for one dialect.
//!
//! Output aliases are the original qualified names quoted as a single
//! identifier (`SUM("o"."amount") AS "o.order_total"`), so result rows come
//! back keyed exactly as the request spelled them. All identifiers are
//! quoted unconditionally. Rendering is a pure function of (catalog,
//! resolved request, plan, options); repeated calls produce byte-identical
//! SQL.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FlowError, FlowResult};
use crate::model::catalog::{FieldRef, FlowContext};
use crate::model::table::{Measure, MeasureFilter, SemanticTable};
use crate::model::types::{Aggregation, FilterOp};
use crate::planner::plan::{Plan, PlanShape};
use crate::planner::resolved::{
    MeasureKind, Pagination, ResolvedDimension, ResolvedRequest,
};
use crate::planner::types::SortDirection;
use crate::sql::dialect::Dialect;
use crate::sql::expr::{
    and_all, col, count, count_distinct, lit_bool, lit_float, lit_int, lit_str, or_all, sum,
    table_col, Expr, ExprExt,
};
use crate::sql::query::{JoinType, OrderByExpr, Query, SelectExpr, TableRef};

/// Environment switch forcing the CASE fallback for filtered aggregates.
/// Observable on rendered SQL only; result values are unchanged.
pub const DISABLE_FILTERED_AGG_ENV: &str = "SEMAFLOW_DISABLE_FILTERED_AGG";

/// Whether the process-wide override disables `FILTER (WHERE ...)`.
pub fn filtered_aggregate_disabled() -> bool {
    std::env::var(DISABLE_FILTERED_AGG_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Dialect plus data-source qualification for one render pass.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub dialect: Dialect,
    /// Effective filtered-aggregate support: the backend capability with
    /// the process override already applied.
    pub filtered_aggregate: bool,
    /// BigQuery project, when tables are three-part qualified.
    pub catalog: Option<String>,
    /// Postgres schema or BigQuery dataset.
    pub schema: Option<String>,
}

impl RenderOptions {
    pub fn new(dialect: Dialect) -> Self {
        use crate::sql::dialect::SqlDialect;
        Self {
            dialect,
            filtered_aggregate: dialect.supports_aggregate_filter()
                && !filtered_aggregate_disabled(),
            catalog: None,
            schema: None,
        }
    }
}

/// Cursor payload: the last row's order tuple plus a schema-version tag.
/// Serialized as base64(JSON). A cursor whose version or key list does not
/// match the request it is replayed against is rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageCursor {
    pub v: u32,
    pub key: Vec<String>,
    pub vals: Vec<Value>,
}

/// Current cursor schema version.
pub const CURSOR_VERSION: u32 = 1;

impl PageCursor {
    pub fn new(key: Vec<String>, vals: Vec<Value>) -> Self {
        Self {
            v: CURSOR_VERSION,
            key,
            vals,
        }
    }

    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).expect("cursor serializes");
        BASE64.encode(json)
    }

    pub fn decode(raw: &str) -> FlowResult<Self> {
        let bytes = BASE64
            .decode(raw)
            .map_err(|_| FlowError::MalformedPagination("cursor is not valid base64".into()))?;
        serde_json::from_slice(&bytes)
            .map_err(|_| FlowError::MalformedPagination("cursor payload is malformed".into()))
    }
}

/// A rendered query plus the metadata the coordinator needs to continue
/// cursor pagination.
#[derive(Debug, Clone)]
pub struct RenderedQuery {
    pub sql: String,
    /// Qualified output names and directions of the cursor order key.
    /// Empty unless the request paginates by cursor.
    pub order_key: Vec<(String, SortDirection)>,
}

/// Renders resolved requests for one flow and one backend.
pub struct SqlRenderer<'a> {
    ctx: &'a FlowContext,
    opts: RenderOptions,
}

impl<'a> SqlRenderer<'a> {
    pub fn new(ctx: &'a FlowContext, opts: RenderOptions) -> Self {
        Self { ctx, opts }
    }

    /// Render the request into SQL.
    pub fn render(&self, request: &ResolvedRequest, plan: &Plan) -> FlowResult<RenderedQuery> {
        let order_key = self.cursor_order_key(request);
        let cursor_pred = self.cursor_predicate(request, plan, &order_key)?;

        let mut query = match plan.shape {
            PlanShape::Flat => self.render_flat(request, plan)?,
            PlanShape::PreAggregate => self.render_pre_aggregate(request, plan)?,
        };

        if let Some(pred) = cursor_pred {
            query = query.filter(pred);
        }
        query = query.order_by(self.order_by(request, &order_key));
        query = match &request.pagination {
            Pagination::None => query,
            Pagination::LimitOffset { limit, offset } => {
                let mut q = query;
                if let Some(limit) = limit {
                    q = q.limit(*limit);
                }
                if let Some(offset) = offset {
                    q = q.offset(*offset);
                }
                q
            }
            // One extra row tells the coordinator whether more pages exist.
            Pagination::Cursor { page_size, .. } => query.limit(page_size + 1),
        };

        Ok(RenderedQuery {
            sql: query.to_sql(self.opts.dialect),
            order_key: order_key
                .iter()
                .map(|(dim, dir)| (dim.field.qualified(), *dir))
                .collect(),
        })
    }

    // =========================================================================
    // Flat plan
    // =========================================================================

    fn render_flat(&self, request: &ResolvedRequest, plan: &Plan) -> FlowResult<Query> {
        let base = self.ctx.base();
        let mut select: Vec<SelectExpr> = Vec::new();
        let mut group_by: Vec<Expr> = Vec::new();

        for dim in &request.dimensions {
            let expr = physical_expr(&dim.field.alias, &dim.expr);
            select.push(expr.clone().alias(&dim.field.qualified()));
            group_by.push(expr);
        }

        // Derived measures inline their dependencies' aggregate SQL.
        let mut agg_sql: BTreeMap<String, String> = BTreeMap::new();
        for measure in &request.measures {
            if let MeasureKind::Derived { deps, .. } = &measure.kind {
                for dep in deps {
                    if !agg_sql.contains_key(&dep.qualified()) {
                        let expr = self.aggregate_expr_for(dep)?;
                        agg_sql.insert(dep.qualified(), self.expr_sql(&expr));
                    }
                }
            }
        }

        for measure in &request.measures {
            let expr = match &measure.kind {
                MeasureKind::Aggregate { expr, agg, filter } => {
                    self.aggregate_expr(&measure.field.alias, expr, *agg, filter.as_ref())?
                }
                MeasureKind::Derived { expr, .. } => {
                    Expr::Raw(substitute_refs(expr, &agg_sql))
                }
            };
            select.push(expr.alias(&measure.field.qualified()));
        }

        let mut query = Query::new()
            .select(select)
            .from(self.table_ref(&base.table, &base.alias));

        for alias in &plan.joins {
            query = self.push_join(query, alias, None)?;
        }

        for filter in &request.filters {
            let lhs = physical_expr(&filter.field.alias, &filter.expr);
            query = query.filter(filter_predicate(lhs, filter.op, &filter.value)?);
        }

        if !group_by.is_empty() {
            query = query.group_by(group_by);
        }
        Ok(query)
    }

    // =========================================================================
    // Pre-aggregate plan
    // =========================================================================

    fn render_pre_aggregate(&self, request: &ResolvedRequest, plan: &Plan) -> FlowResult<Query> {
        let base = self.ctx.base();
        let base_alias = &request.base_alias;
        let derived_alias = self.derived_table_alias();

        // Aggregate dependencies the inner query must compute: requested
        // aggregates plus every derived dependency, first-use order.
        let mut agg_deps: Vec<FieldRef> = Vec::new();
        for measure in &request.measures {
            match &measure.kind {
                MeasureKind::Aggregate { .. } => {
                    if !agg_deps.contains(&measure.field) {
                        agg_deps.push(measure.field.clone());
                    }
                }
                MeasureKind::Derived { deps, .. } => {
                    for dep in deps {
                        if !agg_deps.contains(dep) {
                            agg_deps.push(dep.clone());
                        }
                    }
                }
            }
        }

        // --- inner query: aggregate the base table to the plan's grain ---
        let mut inner_select: Vec<SelectExpr> = Vec::new();
        let mut inner_group: Vec<Expr> = Vec::new();

        for dim in &request.dimensions {
            if dim.field.alias == *base_alias {
                let expr = physical_expr(base_alias, &dim.expr);
                inner_select.push(expr.clone().alias(&dim.field.qualified()));
                inner_group.push(expr);
            }
        }
        for key in &plan.inner_keys {
            let qualified = format!("{}.{}", base_alias, key);
            if inner_select
                .iter()
                .any(|s| s.alias.as_deref() == Some(qualified.as_str()))
            {
                continue;
            }
            let expr = table_col(base_alias, key);
            inner_select.push(expr.clone().alias(&qualified));
            inner_group.push(expr);
        }
        for dep in &agg_deps {
            let expr = self.aggregate_expr_for(dep)?;
            inner_select.push(expr.alias(&dep.qualified()));
        }
        if inner_select.is_empty() {
            // Constant-only measures leave nothing to project.
            inner_select.push(SelectExpr::new(lit_int(1)));
        }

        let mut inner = Query::new()
            .select(inner_select)
            .from(self.table_ref(&base.table, base_alias));

        for filter in request.filters.iter().filter(|f| f.on_base) {
            let lhs = physical_expr(&filter.field.alias, &filter.expr);
            inner = inner.filter(filter_predicate(lhs, filter.op, &filter.value)?);
        }
        if !plan.exists_aliases.is_empty() {
            inner = inner.filter(self.exists_predicate(request, plan)?);
        }
        if !inner_group.is_empty() {
            inner = inner.group_by(inner_group);
        }

        // --- outer query: decorate with joined dimensions, re-aggregate ---
        let reagg_sql: BTreeMap<String, String> = agg_deps
            .iter()
            .map(|dep| {
                let expr = self.reaggregate_expr(&derived_alias, dep);
                (dep.qualified(), self.expr_sql(&expr))
            })
            .collect();

        let mut outer_select: Vec<SelectExpr> = Vec::new();
        let mut outer_group: Vec<Expr> = Vec::new();
        for dim in &request.dimensions {
            let expr = self.outer_dimension_expr(&derived_alias, dim);
            outer_select.push(expr.clone().alias(&dim.field.qualified()));
            outer_group.push(expr);
        }
        for measure in &request.measures {
            let expr = match &measure.kind {
                MeasureKind::Aggregate { .. } => {
                    self.reaggregate_expr(&derived_alias, &measure.field)
                }
                MeasureKind::Derived { expr, .. } => {
                    Expr::Raw(substitute_refs(expr, &reagg_sql))
                }
            };
            outer_select.push(expr.alias(&measure.field.qualified()));
        }

        let mut outer = Query::new()
            .select(outer_select)
            .from_derived(inner, &derived_alias);
        for alias in &plan.joins {
            outer = self.push_join(outer, alias, Some(&derived_alias))?;
        }
        if !outer_group.is_empty() {
            outer = outer.group_by(outer_group);
        }
        Ok(outer)
    }

    /// The correlated EXISTS subquery carrying joined-side filter
    /// predicates. All chain tables join INNER inside the subquery; the
    /// link to the base alias correlates against the enclosing query.
    fn exists_predicate(&self, request: &ResolvedRequest, plan: &Plan) -> FlowResult<Expr> {
        let mut subquery = Query::new().select(vec![lit_int(1)]);
        let mut correlations: Vec<Expr> = Vec::new();

        for (i, alias) in plan.exists_aliases.iter().enumerate() {
            let binding = self.ctx.binding(alias).expect("planned alias is bound");
            let join = binding.join.as_ref().expect("non-base alias has a join");
            let on = and_all(join.keys.iter().map(|key| {
                table_col(&join.to_alias, &key.left).eq(table_col(alias, &key.right))
            }))
            .expect("join keys are non-empty");

            if i == 0 {
                subquery = subquery.from(self.table_ref(&binding.table, alias));
                correlations.push(on);
            } else {
                subquery =
                    subquery.join(JoinType::Inner, self.table_ref(&binding.table, alias), on);
            }
        }

        for pred in correlations {
            subquery = subquery.filter(pred);
        }
        for filter in request.filters.iter().filter(|f| !f.on_base) {
            let lhs = physical_expr(&filter.field.alias, &filter.expr);
            subquery = subquery.filter(filter_predicate(lhs, filter.op, &filter.value)?);
        }

        Ok(Expr::Exists {
            subquery: Box::new(subquery),
            negated: false,
        })
    }

    // =========================================================================
    // Shared pieces
    // =========================================================================

    fn table_ref(&self, table: &SemanticTable, alias: &str) -> TableRef {
        let mut table_ref = TableRef::new(&table.table).with_alias(alias);
        if let Some(schema) = &self.opts.schema {
            table_ref = table_ref.with_schema(schema);
        }
        if let Some(catalog) = &self.opts.catalog {
            table_ref = table_ref.with_catalog(catalog);
        }
        table_ref
    }

    /// Attach one decoration join. `derived_alias` is set under the
    /// pre-aggregate plan, where join keys against the base resolve to the
    /// derived table's projected key columns.
    fn push_join(
        &self,
        query: Query,
        alias: &str,
        derived_alias: Option<&str>,
    ) -> FlowResult<Query> {
        let binding = self
            .ctx
            .binding(alias)
            .ok_or_else(|| FlowError::render(format!("unplanned alias '{}'", alias)))?;
        let join = binding
            .join
            .as_ref()
            .ok_or_else(|| FlowError::render(format!("alias '{}' has no join", alias)))?;
        let base_alias = &self.ctx.flow.base_alias;

        let on = and_all(join.keys.iter().map(|key| {
            let left = match derived_alias {
                Some(derived) if join.to_alias == *base_alias => {
                    table_col(derived, &format!("{}.{}", base_alias, key.left))
                }
                _ => table_col(&join.to_alias, &key.left),
            };
            left.eq(table_col(alias, &key.right))
        }))
        .expect("join keys are non-empty");

        let join_type = match join.kind {
            crate::model::flow::JoinKind::Inner => JoinType::Inner,
            crate::model::flow::JoinKind::Left => JoinType::Left,
            crate::model::flow::JoinKind::Right => JoinType::Right,
            crate::model::flow::JoinKind::Full => JoinType::Full,
        };
        Ok(query.join(join_type, self.table_ref(&binding.table, alias), on))
    }

    /// The aggregate expression of a measure, filter applied per the
    /// effective capability.
    fn aggregate_expr(
        &self,
        alias: &str,
        expr: &str,
        agg: Aggregation,
        filter: Option<&MeasureFilter>,
    ) -> FlowResult<Expr> {
        let value = physical_expr(alias, expr);
        let Some(filter) = filter else {
            return Ok(apply_aggregation(agg, value));
        };

        let binding = self
            .ctx
            .binding(alias)
            .ok_or_else(|| FlowError::render(format!("unknown alias '{}'", alias)))?;
        let dim = binding.table.dimensions.get(&filter.field).ok_or_else(|| {
            FlowError::render(format!(
                "measure filter references unknown dimension '{}'",
                filter.field
            ))
        })?;
        let predicate = filter_predicate(
            physical_expr(alias, &dim.expr),
            filter.op,
            &filter.value,
        )?;

        if self.opts.filtered_aggregate {
            Ok(Expr::AggregateFilter {
                agg: Box::new(apply_aggregation(agg, value)),
                predicate: Box::new(predicate),
            })
        } else {
            // CASE elides non-matching rows to NULL, which every
            // aggregation here ignores (COUNT included).
            Ok(apply_aggregation(
                agg,
                Expr::Case {
                    when_clauses: vec![(predicate, value)],
                    else_clause: None,
                },
            ))
        }
    }

    /// Aggregate expression for a measure addressed by reference.
    fn aggregate_expr_for(&self, field: &FieldRef) -> FlowResult<Expr> {
        match self.ctx.measure(field) {
            Some(Measure::Aggregate {
                expr, agg, filter, ..
            }) => self.aggregate_expr(&field.alias, expr, *agg, filter.as_ref()),
            _ => Err(FlowError::render(format!(
                "'{}' is not an aggregate measure",
                field
            ))),
        }
    }

    /// Outer-layer recombination of an inner partial aggregate.
    fn reaggregate_expr(&self, derived_alias: &str, dep: &FieldRef) -> Expr {
        let partial = table_col(derived_alias, &dep.qualified());
        let agg = match self.ctx.measure(dep) {
            Some(Measure::Aggregate { agg, .. }) => agg.reaggregation(),
            _ => Aggregation::Sum,
        };
        apply_aggregation(agg, partial)
    }

    fn outer_dimension_expr(&self, derived_alias: &str, dim: &ResolvedDimension) -> Expr {
        if dim.field.alias == self.ctx.flow.base_alias {
            table_col(derived_alias, &dim.field.qualified())
        } else {
            physical_expr(&dim.field.alias, &dim.expr)
        }
    }

    /// Alias for the pre-aggregated derived table, avoiding flow aliases.
    fn derived_table_alias(&self) -> String {
        let mut alias = "base".to_string();
        while self.ctx.binding(&alias).is_some() {
            alias.push('_');
        }
        alias
    }

    fn expr_sql(&self, expr: &Expr) -> String {
        expr.to_tokens_for_dialect(self.opts.dialect)
            .serialize(self.opts.dialect)
    }

    // =========================================================================
    // Ordering and cursors
    // =========================================================================

    /// The cursor order key: explicitly ordered dimensions first, then the
    /// remaining requested dimensions ascending as a tiebreaker. The full
    /// dimension tuple is the grouping key, so the key is unique per row.
    fn cursor_order_key<'r>(
        &self,
        request: &'r ResolvedRequest,
    ) -> Vec<(&'r ResolvedDimension, SortDirection)> {
        if !request.pagination.is_cursor() {
            return Vec::new();
        }
        let mut key: Vec<(&ResolvedDimension, SortDirection)> = Vec::new();
        for order in &request.order {
            if let Some(dim) = request.dimensions.iter().find(|d| d.field == order.field) {
                if !key.iter().any(|(d, _)| d.field == dim.field) {
                    key.push((dim, order.direction));
                }
            }
        }
        for dim in &request.dimensions {
            if !key.iter().any(|(d, _)| d.field == dim.field) {
                key.push((dim, SortDirection::Asc));
            }
        }
        key
    }

    /// Lexicographic `(order_tuple) > decoded_cursor` predicate, expanded
    /// to an OR-chain (row-value comparisons are not portable).
    fn cursor_predicate(
        &self,
        request: &ResolvedRequest,
        plan: &Plan,
        order_key: &[(&ResolvedDimension, SortDirection)],
    ) -> FlowResult<Option<Expr>> {
        let Pagination::Cursor {
            cursor: Some(raw), ..
        } = &request.pagination
        else {
            return Ok(None);
        };

        let cursor = PageCursor::decode(raw)?;
        let expected: Vec<String> = order_key
            .iter()
            .map(|(dim, _)| dim.field.qualified())
            .collect();
        if cursor.v != CURSOR_VERSION || cursor.key != expected {
            return Err(FlowError::MalformedPagination(
                "cursor does not match this request's order key".into(),
            ));
        }
        if cursor.vals.len() != expected.len() {
            return Err(FlowError::MalformedPagination(
                "cursor value count does not match its key".into(),
            ));
        }

        let derived_alias = self.derived_table_alias();
        let component_expr = |dim: &ResolvedDimension| match plan.shape {
            PlanShape::Flat => physical_expr(&dim.field.alias, &dim.expr),
            PlanShape::PreAggregate => self.outer_dimension_expr(&derived_alias, dim),
        };

        let mut branches: Vec<Expr> = Vec::new();
        for i in 0..order_key.len() {
            let mut terms: Vec<Expr> = Vec::new();
            for (j, (dim, _)) in order_key.iter().take(i).enumerate() {
                let value = &cursor.vals[j];
                let lhs = component_expr(*dim);
                terms.push(match value {
                    Value::Null => Expr::IsNull {
                        expr: Box::new(lhs),
                        negated: false,
                    },
                    _ => lhs.eq(literal(value)?),
                });
            }
            let (dim, direction) = &order_key[i];
            let value = &cursor.vals[i];
            let lhs = component_expr(*dim);
            let cmp = match value {
                // A NULL key component cannot be advanced past; the branch
                // contributes nothing.
                Value::Null => lit_bool(false),
                _ => match direction {
                    SortDirection::Asc => lhs.gt(literal(value)?),
                    SortDirection::Desc => lhs.lt(literal(value)?),
                },
            };
            terms.push(cmp);
            branches.push(and_all(terms).expect("at least the comparison term"));
        }

        Ok(or_all(branches.into_iter().map(|b| Expr::Paren(Box::new(b)))))
    }

    /// ORDER BY over output aliases: the cursor key when paginating by
    /// cursor, the explicit order list otherwise.
    fn order_by(
        &self,
        request: &ResolvedRequest,
        order_key: &[(&ResolvedDimension, SortDirection)],
    ) -> Vec<OrderByExpr> {
        if request.pagination.is_cursor() {
            order_key
                .iter()
                .map(|(dim, dir)| order_expr(&dim.field.qualified(), *dir))
                .collect()
        } else {
            request
                .order
                .iter()
                .map(|o| order_expr(&o.field.qualified(), o.direction))
                .collect()
        }
    }
}

fn order_expr(qualified: &str, direction: SortDirection) -> OrderByExpr {
    match direction {
        SortDirection::Asc => OrderByExpr::asc(col(qualified)),
        SortDirection::Desc => OrderByExpr::desc(col(qualified)),
    }
}

/// A catalog expression: a bare identifier becomes an alias-qualified
/// column; anything else passes through raw.
fn physical_expr(alias: &str, expr: &str) -> Expr {
    let mut chars = expr.chars();
    let simple = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        table_col(alias, expr)
    } else {
        Expr::Raw(expr.to_string())
    }
}

fn apply_aggregation(agg: Aggregation, value: Expr) -> Expr {
    match agg {
        Aggregation::Sum => sum(value),
        Aggregation::Count => count(value),
        Aggregation::CountDistinct => count_distinct(value),
        Aggregation::Min => crate::sql::expr::min(value),
        Aggregation::Max => crate::sql::expr::max(value),
        Aggregation::Avg => crate::sql::expr::avg(value),
    }
}

/// Build the comparison predicate for one filter.
fn filter_predicate(lhs: Expr, op: FilterOp, value: &Value) -> FlowResult<Expr> {
    let expr = match op {
        FilterOp::Eq => match value {
            Value::Null => Expr::IsNull {
                expr: Box::new(lhs),
                negated: false,
            },
            _ => lhs.eq(literal(value)?),
        },
        FilterOp::Ne => match value {
            Value::Null => Expr::IsNull {
                expr: Box::new(lhs),
                negated: true,
            },
            _ => lhs.ne(literal(value)?),
        },
        FilterOp::Lt => lhs.lt(literal(value)?),
        FilterOp::Lte => lhs.lte(literal(value)?),
        FilterOp::Gt => lhs.gt(literal(value)?),
        FilterOp::Gte => lhs.gte(literal(value)?),
        FilterOp::In | FilterOp::NotIn => {
            let items = value
                .as_array()
                .ok_or_else(|| FlowError::render("'in' filter without a sequence value"))?;
            Expr::In {
                expr: Box::new(lhs),
                values: items.iter().map(literal).collect::<FlowResult<_>>()?,
                negated: op == FilterOp::NotIn,
            }
        }
        FilterOp::Like => Expr::BinaryOp {
            left: Box::new(lhs),
            op: crate::sql::expr::BinaryOperator::Like,
            right: Box::new(literal(value)?),
        },
        FilterOp::ILike => Expr::BinaryOp {
            left: Box::new(lhs),
            op: crate::sql::expr::BinaryOperator::ILike,
            right: Box::new(literal(value)?),
        },
    };
    Ok(expr)
}

/// Convert a JSON scalar to a SQL literal.
fn literal(value: &Value) -> FlowResult<Expr> {
    match value {
        Value::String(s) => Ok(lit_str(s)),
        Value::Bool(b) => Ok(lit_bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(lit_int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(lit_float(f))
            } else {
                Err(FlowError::render(format!("unrepresentable number {}", n)))
            }
        }
        other => Err(FlowError::render(format!(
            "value {} cannot be rendered as a SQL literal",
            other
        ))),
    }
}

/// Replace `alias.field` tokens that appear in `replacements` with their
/// rendered SQL. Used to evaluate derived-measure expressions over the
/// aggregates already present in the query.
fn substitute_refs(expr: &str, replacements: &BTreeMap<String, String>) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)\b")
            .expect("qualified reference pattern")
    });
    re.replace_all(expr, |caps: &regex::Captures<'_>| {
        let token = caps.get(0).expect("full match").as_str();
        replacements
            .get(token)
            .cloned()
            .unwrap_or_else(|| token.to_string())
    })
    .into_owned()
}
