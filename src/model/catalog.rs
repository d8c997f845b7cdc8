//! The validated catalog: tables, flows, and their derived lookup state.
//!
//! A [`Catalog`] is built once at handle construction. Construction runs the
//! full cross-entity validation pass (table references, alias chains, data
//! source agreement, derived-measure cycles) and precomputes per-flow
//! derivatives: the alias bindings, the qualified-name field index, and
//! fully-expanded derived-measure expressions. After construction the
//! catalog is immutable and shared by reference across threads.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;

use crate::error::{FlowError, FlowResult};
use crate::model::flow::{FlowJoin, SemanticFlow};
use crate::model::table::{Measure, SemanticTable};

/// Canonical `(alias, field)` pair addressing a dimension or measure
/// within a flow.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldRef {
    pub alias: String,
    pub name: String,
}

impl FieldRef {
    pub fn new(alias: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            name: name.into(),
        }
    }

    /// The `alias.field` spelling used in requests and result rows.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.alias, self.name)
    }
}

impl std::fmt::Display for FieldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.alias, self.name)
    }
}

/// Whether a qualified name addresses a dimension or a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Dimension,
    Measure,
}

/// One alias of a flow bound to its semantic table. The base alias carries
/// no join; every other binding keeps its declaring join edge.
#[derive(Debug, Clone)]
pub struct AliasBinding {
    pub alias: String,
    pub table: Arc<SemanticTable>,
    pub join: Option<FlowJoin>,
}

/// A derived measure with its expression expanded down to aggregate
/// references only.
#[derive(Debug, Clone)]
pub struct DerivedMeasure {
    /// `post_expr` with derived references substituted transitively; the
    /// remaining qualified references all name aggregate measures.
    pub expr: String,
    /// Aggregate measures the expanded expression references, in first-use
    /// order.
    pub deps: Vec<FieldRef>,
}

/// A flow with its precomputed lookup state.
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub flow: SemanticFlow,
    /// Alias bindings in declaration order, base first.
    pub bindings: Vec<AliasBinding>,
    /// Qualified name -> field kind, for every exported dimension/measure.
    fields: BTreeMap<String, (FieldRef, FieldKind)>,
    /// Bare field name -> qualified candidates across aliases.
    bare: HashMap<String, Vec<FieldRef>>,
    /// Expanded derived measures, keyed by qualified name.
    derived: BTreeMap<String, DerivedMeasure>,
    /// The single data source every table of this flow is bound to.
    pub data_source: String,
}

impl FlowContext {
    pub fn base(&self) -> &AliasBinding {
        &self.bindings[0]
    }

    pub fn binding(&self, alias: &str) -> Option<&AliasBinding> {
        self.bindings.iter().find(|b| b.alias == alias)
    }

    /// Resolve a raw request name (`alias.field` or bare `field`) to its
    /// canonical pair. Bare names must be unique across in-scope aliases.
    pub fn resolve_name(&self, raw: &str) -> FlowResult<(FieldRef, FieldKind)> {
        if let Some((field, kind)) = self.fields.get(raw) {
            return Ok((field.clone(), *kind));
        }
        // Qualified spelling that missed the index is unknown outright;
        // only bare names go through candidate matching.
        if !raw.contains('.') {
            match self.bare.get(raw).map(Vec::as_slice) {
                Some([single]) => {
                    let (field, kind) = &self.fields[&single.qualified()];
                    return Ok((field.clone(), *kind));
                }
                Some(many) if many.len() > 1 => {
                    return Err(FlowError::Ambiguous {
                        field: raw.to_string(),
                        candidates: many.iter().map(FieldRef::qualified).collect(),
                    });
                }
                _ => {}
            }
        }
        Err(FlowError::UnknownField {
            field: raw.to_string(),
        })
    }

    pub fn dimension(&self, field: &FieldRef) -> Option<&crate::model::table::Dimension> {
        self.binding(&field.alias)
            .and_then(|b| b.table.dimensions.get(&field.name))
    }

    pub fn measure(&self, field: &FieldRef) -> Option<&Measure> {
        self.binding(&field.alias)
            .and_then(|b| b.table.measures.get(&field.name))
    }

    /// The expanded form of a derived measure, if `field` names one.
    pub fn derived(&self, field: &FieldRef) -> Option<&DerivedMeasure> {
        self.derived.get(&field.qualified())
    }

    /// Every exported field in deterministic (qualified-name) order.
    pub fn fields(&self) -> impl Iterator<Item = (&FieldRef, FieldKind)> {
        self.fields.values().map(|(f, k)| (f, *k))
    }

    /// Declaration-ordered chain of aliases from `alias` up to (excluding)
    /// the base, following `to_alias` edges.
    pub fn ancestors(&self, alias: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = alias.to_string();
        while let Some(binding) = self.binding(&current) {
            match &binding.join {
                Some(join) if join.to_alias != self.flow.base_alias => {
                    chain.push(join.to_alias.clone());
                    current = join.to_alias.clone();
                }
                _ => break,
            }
        }
        chain
    }
}

/// The immutable, validated catalog shared by a flow handle.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: BTreeMap<String, Arc<SemanticTable>>,
    flows: BTreeMap<String, FlowContext>,
}

impl Catalog {
    /// Build and fully validate a catalog from its parts.
    pub fn build(tables: Vec<SemanticTable>, flows: Vec<SemanticFlow>) -> FlowResult<Catalog> {
        let mut table_map: BTreeMap<String, Arc<SemanticTable>> = BTreeMap::new();
        for table in tables {
            table.validate_structure()?;
            let name = table.name.clone();
            if table_map.insert(name.clone(), Arc::new(table)).is_some() {
                return Err(FlowError::catalog(format!("duplicate table '{}'", name)));
            }
        }

        let mut flow_map = BTreeMap::new();
        for flow in flows {
            flow.validate_structure()?;
            let ctx = build_flow_context(flow, &table_map)?;
            let name = ctx.flow.name.clone();
            if flow_map.insert(name.clone(), ctx).is_some() {
                return Err(FlowError::catalog(format!("duplicate flow '{}'", name)));
            }
        }

        Ok(Catalog {
            tables: table_map,
            flows: flow_map,
        })
    }

    pub fn table(&self, name: &str) -> Option<&Arc<SemanticTable>> {
        self.tables.get(name)
    }

    pub fn flow(&self, name: &str) -> FlowResult<&FlowContext> {
        self.flows
            .get(name)
            .ok_or_else(|| FlowError::UnknownFlow(name.to_string()))
    }

    pub fn flows(&self) -> impl Iterator<Item = &FlowContext> {
        self.flows.values()
    }
}

/// `alias.field` shaped identifier references inside a `post_expr`.
fn qualified_ref_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)\b")
            .expect("qualified reference pattern")
    })
}

fn build_flow_context(
    flow: SemanticFlow,
    tables: &BTreeMap<String, Arc<SemanticTable>>,
) -> FlowResult<FlowContext> {
    let lookup = |name: &str| -> FlowResult<Arc<SemanticTable>> {
        tables.get(name).cloned().ok_or_else(|| {
            FlowError::catalog(format!(
                "flow '{}' references unknown table '{}'",
                flow.name, name
            ))
        })
    };

    let mut bindings = vec![AliasBinding {
        alias: flow.base_alias.clone(),
        table: lookup(&flow.base_table)?,
        join: None,
    }];
    for join in &flow.joins {
        bindings.push(AliasBinding {
            alias: join.alias.clone(),
            table: lookup(&join.semantic_table)?,
            join: Some(join.clone()),
        });
    }

    let data_source = bindings[0].table.data_source.clone();
    for binding in &bindings[1..] {
        if binding.table.data_source != data_source {
            return Err(FlowError::catalog(format!(
                "flow '{}' spans data sources '{}' and '{}'; a flow is bound to one source",
                flow.name, data_source, binding.table.data_source
            )));
        }
    }

    let mut fields: BTreeMap<String, (FieldRef, FieldKind)> = BTreeMap::new();
    let mut bare: HashMap<String, Vec<FieldRef>> = HashMap::new();
    for binding in &bindings {
        for name in binding.table.dimensions.keys() {
            let field = FieldRef::new(&binding.alias, name);
            bare.entry(name.clone()).or_default().push(field.clone());
            fields.insert(field.qualified(), (field, FieldKind::Dimension));
        }
        for name in binding.table.measures.keys() {
            let field = FieldRef::new(&binding.alias, name);
            bare.entry(name.clone()).or_default().push(field.clone());
            fields.insert(field.qualified(), (field, FieldKind::Measure));
        }
    }

    let derived = expand_derived_measures(&flow, &bindings, &fields)?;

    Ok(FlowContext {
        flow,
        bindings,
        fields,
        bare,
        derived,
        data_source,
    })
}

/// Validate derived-measure references, reject cycles, and expand each
/// `post_expr` down to aggregate references.
fn expand_derived_measures(
    flow: &SemanticFlow,
    bindings: &[AliasBinding],
    fields: &BTreeMap<String, (FieldRef, FieldKind)>,
) -> FlowResult<BTreeMap<String, DerivedMeasure>> {
    // Collect raw (qualified name, post_expr) pairs in declaration order.
    let mut raw: BTreeMap<String, String> = BTreeMap::new();
    for binding in bindings {
        for (name, measure) in &binding.table.measures {
            if let Measure::Derived { post_expr, .. } = measure {
                raw.insert(
                    FieldRef::new(&binding.alias, name).qualified(),
                    post_expr.clone(),
                );
            }
        }
    }
    if raw.is_empty() {
        return Ok(BTreeMap::new());
    }

    // Direct dependencies: every qualified reference must name a measure of
    // the flow. References to dimensions or unknown fields are authoring
    // errors surfaced at build time.
    let mut direct: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (qualified, post_expr) in &raw {
        let mut deps = Vec::new();
        for caps in qualified_ref_pattern().captures_iter(post_expr) {
            let referenced = caps.get(0).expect("full match").as_str();
            match fields.get(referenced) {
                Some((_, FieldKind::Measure)) => {
                    if !deps.iter().any(|d| d == referenced) {
                        deps.push(referenced.to_string());
                    }
                }
                Some((_, FieldKind::Dimension)) => {
                    return Err(FlowError::catalog(format!(
                        "flow '{}': derived measure '{}' references dimension '{}'; \
                         post_expr may only reference measures",
                        flow.name, qualified, referenced
                    )));
                }
                None => {
                    return Err(FlowError::catalog(format!(
                        "flow '{}': derived measure '{}' references unknown field '{}'",
                        flow.name, qualified, referenced
                    )));
                }
            }
        }
        direct.insert(qualified.clone(), deps);
    }

    // Topological order over the derived-only subgraph; cycles are rejected.
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
    for qualified in raw.keys() {
        nodes.insert(qualified.clone(), graph.add_node(qualified.clone()));
    }
    for (qualified, deps) in &direct {
        for dep in deps {
            if let Some(&dep_node) = nodes.get(dep) {
                graph.add_edge(dep_node, nodes[qualified], ());
            }
        }
    }
    let order = toposort(&graph, None).map_err(|cycle| {
        FlowError::catalog(format!(
            "flow '{}': cyclic derived measures involving '{}'",
            flow.name,
            graph[cycle.node_id()]
        ))
    })?;

    // Expand in dependency order: derived references are substituted with
    // their (parenthesized) expansions, aggregate references stay in place.
    let mut expanded: BTreeMap<String, DerivedMeasure> = BTreeMap::new();
    for node in order {
        let qualified = graph[node].clone();
        let post_expr = &raw[&qualified];
        let mut deps: Vec<FieldRef> = Vec::new();
        let expr = qualified_ref_pattern()
            .replace_all(post_expr, |caps: &regex::Captures<'_>| {
                let referenced = caps.get(0).expect("full match").as_str();
                if let Some(dep) = expanded.get(referenced) {
                    for agg in &dep.deps {
                        if !deps.contains(agg) {
                            deps.push(agg.clone());
                        }
                    }
                    format!("({})", dep.expr)
                } else {
                    let (field, _) = &fields[referenced];
                    if !deps.contains(field) {
                        deps.push(field.clone());
                    }
                    referenced.to_string()
                }
            })
            .into_owned();
        expanded.insert(qualified, DerivedMeasure { expr, deps });
    }

    Ok(expanded)
}
