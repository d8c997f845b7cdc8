//! Shared fixtures: the orders/customers catalog and seeded DuckDB source.
#![allow(dead_code)]

use semaflow::backend::DataSource;
use semaflow::handle::FlowHandle;
use semaflow::model::{
    Aggregation, Dimension, FilterOp, FlowJoin, JoinKey, JoinKind, Measure, MeasureFilter,
    SemanticFlow, SemanticTable,
};

/// Seed rows: 4 customers (US/UK/US/DE), 5 orders totalling 450.0.
pub const SEED_SQL: &str = "\
CREATE TABLE customers (id INTEGER, name VARCHAR, country VARCHAR);
INSERT INTO customers VALUES
  (1, 'Alice', 'US'),
  (2, 'Bob', 'UK'),
  (3, 'Carla', 'US'),
  (4, 'David', 'DE');
CREATE TABLE orders (id INTEGER, customer_id INTEGER, amount DOUBLE, status VARCHAR, created_at TIMESTAMP);
INSERT INTO orders VALUES
  (1, 1, 100.0, 'complete', '2024-01-01'),
  (2, 1, 50.0, 'complete', '2024-01-02'),
  (3, 2, 25.0, 'pending', '2024-01-03'),
  (4, 3, 200.0, 'complete', '2024-01-04'),
  (5, 3, 75.0, 'pending', '2024-01-05');
";

pub fn orders_table() -> SemanticTable {
    let mut table = SemanticTable {
        name: "orders".into(),
        data_source: "test_db".into(),
        table: "orders".into(),
        primary_key: Some("id".into()),
        time_dimension: Some("created_at".into()),
        dimensions: Default::default(),
        measures: Default::default(),
        description: Some("Orders fact table".into()),
    };
    table
        .dimensions
        .insert("order_id".into(), Dimension::new("id"));
    table
        .dimensions
        .insert("status".into(), Dimension::new("status"));
    table
        .dimensions
        .insert("customer_id".into(), Dimension::new("customer_id"));
    table
        .dimensions
        .insert("created_at".into(), Dimension::new("created_at"));
    table.measures.insert(
        "order_total".into(),
        Measure::aggregate("amount", Aggregation::Sum),
    );
    table.measures.insert(
        "order_count".into(),
        Measure::aggregate("id", Aggregation::Count),
    );
    table.measures.insert(
        "avg_amount".into(),
        Measure::aggregate("amount", Aggregation::Avg),
    );
    table.measures.insert(
        "distinct_customers".into(),
        Measure::aggregate("customer_id", Aggregation::CountDistinct),
    );
    table.measures.insert(
        "completed_total".into(),
        Measure::aggregate("amount", Aggregation::Sum).with_filter(MeasureFilter {
            field: "status".into(),
            op: FilterOp::Eq,
            value: "complete".into(),
        }),
    );
    table.measures.insert(
        "avg_order_amount".into(),
        Measure::derived("o.order_total / o.order_count"),
    );
    table
}

pub fn customers_table() -> SemanticTable {
    let mut table = SemanticTable {
        name: "customers".into(),
        data_source: "test_db".into(),
        table: "customers".into(),
        primary_key: Some("id".into()),
        time_dimension: None,
        dimensions: Default::default(),
        measures: Default::default(),
        description: Some("Customers dimension".into()),
    };
    table
        .dimensions
        .insert("customer_id".into(), Dimension::new("id"));
    table.dimensions.insert("name".into(), Dimension::new("name"));
    table
        .dimensions
        .insert("country".into(), Dimension::new("country"));
    table.measures.insert(
        "customer_count".into(),
        Measure::aggregate("id", Aggregation::CountDistinct),
    );
    table
}

pub fn simple_flow() -> SemanticFlow {
    SemanticFlow::new("simple_orders", "orders", "o")
}

pub fn joined_flow() -> SemanticFlow {
    SemanticFlow::new("sales", "orders", "o")
        .with_join(FlowJoin {
            semantic_table: "customers".into(),
            alias: "c".into(),
            to_alias: "o".into(),
            kind: JoinKind::Left,
            keys: vec![JoinKey::new("customer_id", "id")],
        })
        .with_description("Sales data for the company")
}

pub fn seeded_source() -> DataSource {
    DataSource::duckdb_with_init(":memory:", "test_db", SEED_SQL)
}

pub fn simple_handle() -> FlowHandle {
    FlowHandle::from_parts(vec![orders_table()], vec![simple_flow()], vec![seeded_source()])
        .expect("simple handle builds")
}

pub fn joined_handle() -> FlowHandle {
    FlowHandle::from_parts(
        vec![orders_table(), customers_table()],
        vec![joined_flow()],
        vec![seeded_source()],
    )
    .expect("joined handle builds")
}

/// Unwrap a plain (non-paginated) outcome into its rows.
pub fn rows(outcome: semaflow::exec::QueryOutcome) -> Vec<semaflow::exec::RowMap> {
    match outcome {
        semaflow::exec::QueryOutcome::Rows(rows) => rows,
        other => panic!("expected plain rows, got {other:?}"),
    }
}

/// Numeric cell accessor; counts and sums compare through f64.
pub fn number(row: &semaflow::exec::RowMap, key: &str) -> f64 {
    row.get(key)
        .and_then(|v| v.as_f64())
        .unwrap_or_else(|| panic!("row has no numeric '{key}': {row:?}"))
}

/// Find the row whose `key` column equals `value`.
pub fn row_where<'a>(
    rows: &'a [semaflow::exec::RowMap],
    key: &str,
    value: &str,
) -> &'a semaflow::exec::RowMap {
    rows.iter()
        .find(|r| r.get(key).and_then(|v| v.as_str()) == Some(value))
        .unwrap_or_else(|| panic!("no row with {key}={value}: {rows:?}"))
}

/// Both flows on one handle, sharing tables and the seeded source.
pub fn full_handle() -> FlowHandle {
    FlowHandle::from_parts(
        vec![orders_table(), customers_table()],
        vec![simple_flow(), joined_flow()],
        vec![seeded_source()],
    )
    .expect("full handle builds")
}
