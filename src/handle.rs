//! The public façade: a validated, connection-aware handle over a catalog.
//!
//! A [`FlowHandle`] is built once (from parts or from a YAML directory),
//! runs the full cross-entity validation pass at construction, and is then
//! shared by reference across threads. `build_sql` touches only immutable
//! state and is lock-free; `execute` additionally borrows a backend client
//! from the registry.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::backend::{ConnectionRegistry, DataSource};
use crate::error::{FlowError, FlowResult};
use crate::exec::{render_options, Coordinator, QueryOutcome};
use crate::model::catalog::{Catalog, FieldKind, FlowContext};
use crate::model::flow::SemanticFlow;
use crate::model::loader::load_catalog_dir;
use crate::model::table::SemanticTable;
use crate::planner::plan::PlanBuilder;
use crate::planner::resolve::validate_request;
use crate::planner::types::QueryRequest;
use crate::sql::render::SqlRenderer;

/// One entry of `list_flows`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FlowSummary {
    pub name: String,
    pub description: Option<String>,
}

/// One exported dimension or measure of a flow schema.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldSchema {
    pub qualified_name: String,
    pub description: Option<String>,
    pub data_type: Option<String>,
}

/// The schema of one flow, as returned by `get_flow`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FlowSchema {
    pub name: String,
    pub description: Option<String>,
    /// Qualified name of the base table's time dimension, if declared.
    pub time_dimension: Option<String>,
    pub dimensions: Vec<FieldSchema>,
    pub measures: Vec<FieldSchema>,
}

/// Validated handle multiplexing requests across validation, planning,
/// rendering, and execution. Cheap to clone; all clones share the catalog
/// and the connection registry.
#[derive(Debug, Clone)]
pub struct FlowHandle {
    catalog: Arc<Catalog>,
    registry: Arc<ConnectionRegistry>,
    row_cap: Option<usize>,
}

impl FlowHandle {
    /// Build a handle from already-constructed catalog objects and
    /// data-source descriptors.
    pub fn from_parts(
        tables: Vec<SemanticTable>,
        flows: Vec<SemanticFlow>,
        data_sources: Vec<DataSource>,
    ) -> FlowResult<Self> {
        let registry = ConnectionRegistry::from_sources(data_sources)?;
        Self::with_registry(tables, flows, registry)
    }

    /// Build a handle from a catalog directory (`tables/` + `flows/`).
    pub fn from_dir(root: impl AsRef<Path>, data_sources: Vec<DataSource>) -> FlowResult<Self> {
        let (tables, flows) = load_catalog_dir(root.as_ref())?;
        Self::from_parts(tables, flows, data_sources)
    }

    /// Build a handle over a caller-assembled registry (custom backends).
    pub fn with_registry(
        tables: Vec<SemanticTable>,
        flows: Vec<SemanticFlow>,
        registry: ConnectionRegistry,
    ) -> FlowResult<Self> {
        let catalog = Catalog::build(tables, flows)?;
        for ctx in catalog.flows() {
            if !registry.contains(&ctx.data_source) {
                return Err(FlowError::catalog(format!(
                    "flow '{}' is bound to data source '{}', which has no backend",
                    ctx.flow.name, ctx.data_source
                )));
            }
        }
        Ok(Self {
            catalog: Arc::new(catalog),
            registry: Arc::new(registry),
            row_cap: None,
        })
    }

    /// Abort executions returning more than `cap` rows.
    pub fn with_row_cap(mut self, cap: usize) -> Self {
        self.row_cap = Some(cap);
        self
    }

    /// Registered flows with their descriptions, name order.
    pub fn list_flows(&self) -> Vec<FlowSummary> {
        self.catalog
            .flows()
            .map(|ctx| FlowSummary {
                name: ctx.flow.name.clone(),
                description: ctx.flow.description.clone(),
            })
            .collect()
    }

    /// The schema a flow exports: qualified dimensions and measures.
    pub fn get_flow(&self, name: &str) -> FlowResult<FlowSchema> {
        let ctx = self.catalog.flow(name)?;
        Ok(flow_schema(ctx))
    }

    /// Compile a request into SQL without executing it. Pure and cheap:
    /// deterministic output for a fixed catalog and request.
    pub fn build_sql(&self, request: &QueryRequest) -> FlowResult<String> {
        let ctx = self.catalog.flow(&request.flow)?;
        let resolved = validate_request(ctx, request)?;
        let plan = PlanBuilder::build(ctx, &resolved)?;
        let backend = self.registry.get(&resolved.data_source)?;
        let rendered = SqlRenderer::new(ctx, render_options(backend.capabilities()))
            .render(&resolved, &plan)?;
        Ok(rendered.sql)
    }

    /// Validate, compile, and execute a request against its backend.
    pub async fn execute(&self, request: &QueryRequest) -> FlowResult<QueryOutcome> {
        let ctx = self.catalog.flow(&request.flow)?;
        let resolved = validate_request(ctx, request)?;
        let plan = PlanBuilder::build(ctx, &resolved)?;
        Coordinator::new(self.registry.as_ref(), self.row_cap)
            .run(ctx, &resolved, &plan)
            .await
    }
}

fn flow_schema(ctx: &FlowContext) -> FlowSchema {
    let mut dimensions = Vec::new();
    let mut measures = Vec::new();
    for (field, kind) in ctx.fields() {
        match kind {
            FieldKind::Dimension => {
                let dim = ctx.dimension(field).expect("indexed dimension exists");
                dimensions.push(FieldSchema {
                    qualified_name: field.qualified(),
                    description: dim.description.clone(),
                    data_type: dim.data_type.as_ref().map(|t| t.as_str().to_string()),
                });
            }
            FieldKind::Measure => {
                let measure = ctx.measure(field).expect("indexed measure exists");
                measures.push(FieldSchema {
                    qualified_name: field.qualified(),
                    description: measure.description().map(String::from),
                    data_type: None,
                });
            }
        }
    }
    let base = ctx.base();
    FlowSchema {
        name: ctx.flow.name.clone(),
        description: ctx.flow.description.clone(),
        time_dimension: base
            .table
            .time_dimension
            .as_ref()
            .map(|td| format!("{}.{}", base.alias, td)),
        dimensions,
        measures,
    }
}
