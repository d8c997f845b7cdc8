#[path = "../support/mod.rs"]
mod support;

use semaflow::model::FilterOp;
use semaflow::planner::types::{Filter, OrderItem, QueryRequest};
use serde_json::json;

fn country_totals() -> QueryRequest {
    let mut request = QueryRequest::for_flow("sales");
    request.dimensions = vec!["c.country".into()];
    request.measures = vec!["o.order_total".into()];
    request
}

#[test]
fn test_flat_join_query_shape() {
    let handle = support::joined_handle();
    let sql = handle.build_sql(&country_totals()).unwrap();
    assert!(sql.contains("SELECT"));
    assert!(sql.contains("\"c\".\"country\" AS \"c.country\""));
    assert!(sql.contains("SUM(\"o\".\"amount\") AS \"o.order_total\""));
    assert!(sql.contains("FROM \"orders\" AS \"o\""));
    assert!(sql.contains("LEFT JOIN \"customers\" AS \"c\" ON \"o\".\"customer_id\" = \"c\".\"id\""));
    assert!(sql.contains("GROUP BY \"c\".\"country\""));
    assert!(!sql.contains("EXISTS"));
}

#[test]
fn test_base_filter_stays_flat() {
    let handle = support::joined_handle();
    let mut request = country_totals();
    request.filters = vec![Filter::new("o.status", FilterOp::Eq, json!("complete"))];
    let sql = handle.build_sql(&request).unwrap();
    assert!(sql.contains("WHERE \"o\".\"status\" = 'complete'"));
    assert!(!sql.contains("EXISTS"));
}

#[test]
fn test_joined_filter_renders_exists_subquery() {
    let handle = support::joined_handle();
    let mut request = country_totals();
    request.filters = vec![Filter::new("c.country", FilterOp::Eq, json!("US"))];
    let sql = handle.build_sql(&request).unwrap();
    assert!(sql.contains("EXISTS ("));
    assert!(sql.contains("\"o\".\"customer_id\" = \"c\".\"id\""));
    assert!(sql.contains("\"c\".\"country\" = 'US'"));
    assert!(sql.contains("LEFT JOIN \"customers\" AS \"c\" ON \"base\".\"o.customer_id\" = \"c\".\"id\""));
    // Inner derived query aggregated to the join-key grain.
    assert!(sql.contains(") AS \"base\""));
    assert!(sql.contains("GROUP BY \"o\".\"customer_id\""));
    // Outer layer recombines partials and re-groups to the request grain.
    assert!(sql.contains("SUM(\"base\".\"o.order_total\") AS \"o.order_total\""));
    assert!(sql.contains("GROUP BY \"c\".\"country\""));
}

#[test]
fn test_derived_measure_inlines_dependencies() {
    let handle = support::joined_handle();
    let mut request = country_totals();
    request.measures = vec![
        "o.order_total".into(),
        "o.order_count".into(),
        "o.avg_order_amount".into(),
    ];
    let sql = handle.build_sql(&request).unwrap();
    assert!(sql
        .contains("SUM(\"o\".\"amount\") / COUNT(\"o\".\"id\") AS \"o.avg_order_amount\""));
}

#[test]
fn test_derived_measure_under_pre_aggregate() {
    let handle = support::joined_handle();
    let mut request = country_totals();
    request.measures = vec!["o.avg_order_amount".into()];
    request.filters = vec![Filter::new("c.country", FilterOp::Eq, json!("US"))];
    let sql = handle.build_sql(&request).unwrap();
    // Dependencies are computed in the inner layer and recombined outside,
    // even though neither was requested.
    assert!(sql.contains("SUM(\"o\".\"amount\") AS \"o.order_total\""));
    assert!(sql.contains("COUNT(\"o\".\"id\") AS \"o.order_count\""));
    assert!(sql.contains(
        "SUM(\"base\".\"o.order_total\") / SUM(\"base\".\"o.order_count\") AS \"o.avg_order_amount\""
    ));
}

#[test]
fn test_order_and_limit_offset() {
    let handle = support::joined_handle();
    let mut request = country_totals();
    request.order = vec![OrderItem::desc("o.order_total"), OrderItem::asc("c.country")];
    request.limit = Some(5);
    request.offset = Some(10);
    let sql = handle.build_sql(&request).unwrap();
    assert!(sql.contains("ORDER BY \"o.order_total\" DESC, \"c.country\" ASC"));
    assert!(sql.contains("LIMIT 5 OFFSET 10"));
}

#[test]
fn test_in_and_like_filters() {
    let handle = support::joined_handle();
    let mut request = country_totals();
    request.filters = vec![Filter::new(
        "o.status",
        FilterOp::In,
        json!(["complete", "pending"]),
    )];
    let sql = handle.build_sql(&request).unwrap();
    assert!(sql.contains("\"o\".\"status\" IN ('complete', 'pending')"));

    request.filters = vec![Filter::new("o.status", FilterOp::NotIn, json!(["failed"]))];
    let sql = handle.build_sql(&request).unwrap();
    assert!(sql.contains("\"o\".\"status\" NOT IN ('failed')"));

    request.filters = vec![Filter::new("o.status", FilterOp::Like, json!("comp%"))];
    let sql = handle.build_sql(&request).unwrap();
    assert!(sql.contains("\"o\".\"status\" LIKE 'comp%'"));
}

#[test]
fn test_null_equality_renders_is_null() {
    let handle = support::joined_handle();
    let mut request = country_totals();
    request.filters = vec![Filter::new("o.status", FilterOp::Eq, json!(null))];
    let sql = handle.build_sql(&request).unwrap();
    assert!(sql.contains("\"o\".\"status\" IS NULL"));

    request.filters = vec![Filter::new("o.status", FilterOp::Ne, json!(null))];
    let sql = handle.build_sql(&request).unwrap();
    assert!(sql.contains("\"o\".\"status\" IS NOT NULL"));
}

#[test]
fn test_build_sql_is_byte_stable() {
    let handle = support::joined_handle();
    let mut request = country_totals();
    request.filters = vec![Filter::new("c.country", FilterOp::Eq, json!("US"))];
    request.order = vec![OrderItem::desc("o.order_total")];
    let first = handle.build_sql(&request).unwrap();
    for _ in 0..20 {
        assert_eq!(handle.build_sql(&request).unwrap(), first);
    }
}

#[test]
fn test_build_sql_is_byte_stable_across_threads() {
    let handle = support::joined_handle();
    let mut request = country_totals();
    request.filters = vec![Filter::new("c.country", FilterOp::Eq, json!("US"))];
    let expected = handle.build_sql(&request).unwrap();

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let handle = handle.clone();
            let request = request.clone();
            let expected = expected.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    assert_eq!(handle.build_sql(&request).unwrap(), expected);
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
}

#[test]
fn test_unknown_field_emits_no_sql() {
    let handle = support::joined_handle();
    let mut request = country_totals();
    request.dimensions = vec!["c.nope".into()];
    let err = handle.build_sql(&request).unwrap_err();
    assert_eq!(err.field(), Some("c.nope"));
}
