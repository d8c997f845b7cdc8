//! Execution coordination: plan -> SQL -> rows.
//!
//! The coordinator selects the backend by data-source name, renders SQL
//! with that backend's capabilities, executes it, reshapes each row into a
//! `{qualified_name: value}` map, and applies cursor pagination.

use serde_json::Value;

use crate::backend::{BackendCapabilities, ConnectionRegistry, RowSet};
use crate::error::{FlowError, FlowResult};
use crate::model::catalog::FlowContext;
use crate::planner::plan::Plan;
use crate::planner::resolved::{Pagination, ResolvedRequest};
use crate::planner::types::SortDirection;
use crate::sql::render::{
    filtered_aggregate_disabled, PageCursor, RenderOptions, SqlRenderer,
};

/// One result row keyed by qualified names (`"o.order_total"`).
pub type RowMap = serde_json::Map<String, Value>;

/// Result of executing a request.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Plain execution: every row.
    Rows(Vec<RowMap>),
    /// Cursor pagination: one page plus continuation state.
    Page {
        rows: Vec<RowMap>,
        cursor: Option<String>,
        has_more: bool,
    },
}

/// Render options matching a backend's capability profile, with the
/// process-wide filtered-aggregate override applied.
pub fn render_options(caps: &BackendCapabilities) -> RenderOptions {
    RenderOptions {
        dialect: caps.dialect,
        filtered_aggregate: caps.filtered_aggregate && !filtered_aggregate_disabled(),
        catalog: caps.catalog.clone(),
        schema: caps.schema.clone(),
    }
}

/// Serializes plan -> SQL -> rows for one handle.
pub struct Coordinator<'a> {
    registry: &'a ConnectionRegistry,
    row_cap: Option<usize>,
}

impl<'a> Coordinator<'a> {
    pub fn new(registry: &'a ConnectionRegistry, row_cap: Option<usize>) -> Self {
        Self { registry, row_cap }
    }

    pub async fn run(
        &self,
        ctx: &FlowContext,
        request: &ResolvedRequest,
        plan: &Plan,
    ) -> FlowResult<QueryOutcome> {
        let backend = self.registry.get(&request.data_source)?;
        let rendered =
            SqlRenderer::new(ctx, render_options(backend.capabilities())).render(request, plan)?;
        let rowset = backend.execute(&rendered.sql).await?;

        if let Some(cap) = self.row_cap {
            if rowset.rows.len() > cap {
                return Err(FlowError::BackendFailure(format!(
                    "result exceeded the row cap of {} rows",
                    cap
                )));
            }
        }

        let rows = reshape(rowset);
        match &request.pagination {
            Pagination::Cursor { page_size, .. } => {
                Ok(paginate(rows, *page_size, &rendered.order_key))
            }
            _ => Ok(QueryOutcome::Rows(rows)),
        }
    }
}

/// Zip backend columns and values into qualified-name maps, preserving
/// backend row order.
fn reshape(rowset: RowSet) -> Vec<RowMap> {
    rowset
        .rows
        .into_iter()
        .map(|record| {
            rowset
                .columns
                .iter()
                .cloned()
                .zip(record)
                .collect::<RowMap>()
        })
        .collect()
}

/// The renderer fetched `page_size + 1` rows; the extra row only signals
/// that another page exists.
fn paginate(
    mut rows: Vec<RowMap>,
    page_size: u64,
    order_key: &[(String, SortDirection)],
) -> QueryOutcome {
    let page_size = page_size as usize;
    let has_more = rows.len() > page_size;
    rows.truncate(page_size);

    let cursor = rows.last().map(|last| {
        let key: Vec<String> = order_key.iter().map(|(name, _)| name.clone()).collect();
        let vals: Vec<Value> = key
            .iter()
            .map(|name| last.get(name).cloned().unwrap_or(Value::Null))
            .collect();
        PageCursor::new(key, vals).encode()
    });

    QueryOutcome::Page {
        rows,
        cursor,
        has_more,
    }
}
