#[path = "../support/mod.rs"]
mod support;

use semaflow::error::FlowError;
use semaflow::model::{Aggregation, Dimension, FilterOp, Measure, MeasureFilter, SemanticTable};

#[test]
fn test_fixture_table_is_structurally_valid() {
    let table = support::orders_table();
    assert!(table.validate_structure().is_ok());
    assert_eq!(table.name, "orders");
    assert!(table.dimensions.contains_key("status"));
    assert!(table.measures.contains_key("order_total"));
}

#[test]
fn test_dimension_builder() {
    let dim = Dimension::new("amount")
        .with_description("Order amount")
        .with_data_type(semaflow::model::DataType::Float64);
    assert_eq!(dim.expr, "amount");
    assert_eq!(dim.description.as_deref(), Some("Order amount"));
}

#[test]
fn test_measure_variants() {
    let agg = Measure::aggregate("amount", Aggregation::Sum);
    assert!(!agg.is_derived());
    let derived = Measure::derived("o.order_total / o.order_count");
    assert!(derived.is_derived());
}

#[test]
fn test_rejects_dimension_measure_name_collision() {
    let mut table = support::orders_table();
    table
        .measures
        .insert("status".into(), Measure::aggregate("id", Aggregation::Count));
    assert!(matches!(
        table.validate_structure(),
        Err(FlowError::CatalogInvalid(_))
    ));
}

#[test]
fn test_rejects_unknown_time_dimension() {
    let mut table = support::orders_table();
    table.time_dimension = Some("shipped_at".into());
    let err = table.validate_structure().unwrap_err();
    assert!(err.to_string().contains("shipped_at"));
}

#[test]
fn test_rejects_measure_filter_on_unknown_dimension() {
    let mut table = support::orders_table();
    table.measures.insert(
        "weird_total".into(),
        Measure::aggregate("amount", Aggregation::Sum).with_filter(MeasureFilter {
            field: "nonexistent".into(),
            op: FilterOp::Eq,
            value: "x".into(),
        }),
    );
    assert!(matches!(
        table.validate_structure(),
        Err(FlowError::CatalogInvalid(_))
    ));
}

#[test]
fn test_rejects_empty_names() {
    let table = SemanticTable {
        name: String::new(),
        data_source: "db".into(),
        table: "t".into(),
        primary_key: None,
        time_dimension: None,
        dimensions: Default::default(),
        measures: Default::default(),
        description: None,
    };
    assert!(table.validate_structure().is_err());
}

#[test]
fn test_table_yaml_roundtrip() {
    let yaml = "
name: orders
data_source: test_db
table: orders
primary_key: id
time_dimension: created_at
dimensions:
  status:
    expr: status
  customer_id:
    expr: customer_id
measures:
  order_total:
    expr: amount
    agg: sum
  order_count:
    expr: id
    agg: count
  avg_order_amount:
    post_expr: o.order_total / o.order_count
";
    let table: SemanticTable = serde_yaml::from_str(yaml).unwrap();
    assert!(table.validate_structure().is_ok());
    assert_eq!(table.time_dimension.as_deref(), Some("created_at"));
    assert!(matches!(
        table.measures.get("order_total"),
        Some(Measure::Aggregate {
            agg: Aggregation::Sum,
            ..
        })
    ));
    assert!(table.measures.get("avg_order_amount").unwrap().is_derived());
}
