#[path = "../support/mod.rs"]
mod support;

use semaflow::error::FlowError;
use semaflow::model::catalog::{Catalog, FieldKind, FieldRef};
use semaflow::model::{Measure, SemanticFlow};

fn sales_catalog() -> Catalog {
    Catalog::build(
        vec![support::orders_table(), support::customers_table()],
        vec![support::joined_flow()],
    )
    .expect("catalog builds")
}

#[test]
fn test_build_and_lookup() {
    let catalog = sales_catalog();
    let ctx = catalog.flow("sales").unwrap();
    assert_eq!(ctx.data_source, "test_db");
    assert_eq!(ctx.bindings.len(), 2);
    assert_eq!(ctx.base().alias, "o");
    assert!(matches!(
        catalog.flow("nonexistent"),
        Err(FlowError::UnknownFlow(_))
    ));
}

#[test]
fn test_resolve_qualified_names() {
    let catalog = sales_catalog();
    let ctx = catalog.flow("sales").unwrap();

    let (field, kind) = ctx.resolve_name("c.country").unwrap();
    assert_eq!(field, FieldRef::new("c", "country"));
    assert_eq!(kind, FieldKind::Dimension);

    let (field, kind) = ctx.resolve_name("o.order_total").unwrap();
    assert_eq!(field.qualified(), "o.order_total");
    assert_eq!(kind, FieldKind::Measure);
}

#[test]
fn test_resolve_bare_name_when_unique() {
    let catalog = sales_catalog();
    let ctx = catalog.flow("sales").unwrap();
    // "country" exists only on customers.
    let (field, _) = ctx.resolve_name("country").unwrap();
    assert_eq!(field.qualified(), "c.country");
}

#[test]
fn test_bare_name_ambiguity() {
    let catalog = sales_catalog();
    let ctx = catalog.flow("sales").unwrap();
    // "customer_id" is exported by both aliases.
    let err = ctx.resolve_name("customer_id").unwrap_err();
    match err {
        FlowError::Ambiguous { field, candidates } => {
            assert_eq!(field, "customer_id");
            assert!(candidates.contains(&"o.customer_id".to_string()));
            assert!(candidates.contains(&"c.customer_id".to_string()));
        }
        other => panic!("expected Ambiguous, got {other:?}"),
    }
}

#[test]
fn test_unknown_field() {
    let catalog = sales_catalog();
    let ctx = catalog.flow("sales").unwrap();
    assert!(matches!(
        ctx.resolve_name("c.nope"),
        Err(FlowError::UnknownField { .. })
    ));
}

#[test]
fn test_derived_measures_expand_to_aggregates() {
    let catalog = sales_catalog();
    let ctx = catalog.flow("sales").unwrap();
    let derived = ctx.derived(&FieldRef::new("o", "avg_order_amount")).unwrap();
    assert_eq!(derived.expr, "o.order_total / o.order_count");
    assert_eq!(
        derived.deps,
        vec![FieldRef::new("o", "order_total"), FieldRef::new("o", "order_count")]
    );
}

#[test]
fn test_rejects_unknown_table_reference() {
    let err = Catalog::build(
        vec![support::orders_table()],
        vec![support::joined_flow()], // references customers, not provided
    )
    .unwrap_err();
    assert!(err.to_string().contains("customers"));
}

#[test]
fn test_rejects_flow_spanning_data_sources() {
    let mut customers = support::customers_table();
    customers.data_source = "other_db".into();
    let err = Catalog::build(
        vec![support::orders_table(), customers],
        vec![support::joined_flow()],
    )
    .unwrap_err();
    assert!(err.to_string().contains("spans data sources"));
}

#[test]
fn test_rejects_cyclic_derived_measures() {
    let mut orders = support::orders_table();
    orders
        .measures
        .insert("m1".into(), Measure::derived("o.m2 + 1"));
    orders
        .measures
        .insert("m2".into(), Measure::derived("o.m1 * 2"));
    let err = Catalog::build(
        vec![orders],
        vec![SemanticFlow::new("simple_orders", "orders", "o")],
    )
    .unwrap_err();
    assert!(err.to_string().contains("cyclic"));
}

#[test]
fn test_rejects_derived_reference_to_dimension() {
    let mut orders = support::orders_table();
    orders
        .measures
        .insert("bad".into(), Measure::derived("o.status + 1"));
    let err = Catalog::build(
        vec![orders],
        vec![SemanticFlow::new("simple_orders", "orders", "o")],
    )
    .unwrap_err();
    assert!(err.to_string().contains("may only reference measures"));
}

#[test]
fn test_rejects_derived_reference_to_unknown_field() {
    let mut orders = support::orders_table();
    orders
        .measures
        .insert("bad".into(), Measure::derived("o.ghost / 2"));
    let err = Catalog::build(
        vec![orders],
        vec![SemanticFlow::new("simple_orders", "orders", "o")],
    )
    .unwrap_err();
    assert!(err.to_string().contains("unknown field"));
}

#[test]
fn test_derived_chain_expands_transitively() {
    let mut orders = support::orders_table();
    orders
        .measures
        .insert("double_avg".into(), Measure::derived("o.avg_order_amount * 2"));
    let catalog = Catalog::build(
        vec![orders],
        vec![SemanticFlow::new("simple_orders", "orders", "o")],
    )
    .unwrap();
    let ctx = catalog.flow("simple_orders").unwrap();
    let derived = ctx.derived(&FieldRef::new("o", "double_avg")).unwrap();
    assert_eq!(derived.expr, "(o.order_total / o.order_count) * 2");
    assert_eq!(
        derived.deps,
        vec![FieldRef::new("o", "order_total"), FieldRef::new("o", "order_count")]
    );
}

#[test]
fn test_ancestor_chain() {
    let catalog = sales_catalog();
    let ctx = catalog.flow("sales").unwrap();
    // c attaches directly to the base; no intermediate ancestors.
    assert!(ctx.ancestors("c").is_empty());
}
