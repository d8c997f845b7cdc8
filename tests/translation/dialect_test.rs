#[path = "../support/mod.rs"]
mod support;

use semaflow::model::catalog::Catalog;
use semaflow::model::FilterOp;
use semaflow::planner::plan::PlanBuilder;
use semaflow::planner::resolve::validate_request;
use semaflow::planner::types::{Filter, QueryRequest};
use semaflow::sql::render::{RenderOptions, SqlRenderer};
use semaflow::sql::Dialect;
use serde_json::json;

fn sales_catalog() -> Catalog {
    Catalog::build(
        vec![support::orders_table(), support::customers_table()],
        vec![support::joined_flow()],
    )
    .unwrap()
}

fn render(request: &QueryRequest, opts: RenderOptions) -> String {
    let catalog = sales_catalog();
    let ctx = catalog.flow("sales").unwrap();
    let resolved = validate_request(ctx, request).unwrap();
    let plan = PlanBuilder::build(ctx, &resolved).unwrap();
    SqlRenderer::new(ctx, opts).render(&resolved, &plan).unwrap().sql
}

fn country_totals() -> QueryRequest {
    let mut request = QueryRequest::for_flow("sales");
    request.dimensions = vec!["c.country".into()];
    request.measures = vec!["o.order_total".into()];
    request
}

#[test]
fn test_postgres_schema_qualification() {
    let opts = RenderOptions {
        dialect: Dialect::Postgres,
        filtered_aggregate: true,
        catalog: None,
        schema: Some("public".into()),
    };
    let sql = render(&country_totals(), opts);
    assert!(sql.contains("FROM \"public\".\"orders\" AS \"o\""));
    assert!(sql.contains("LEFT JOIN \"public\".\"customers\" AS \"c\""));
}

#[test]
fn test_bigquery_three_part_qualification_and_backticks() {
    let opts = RenderOptions {
        dialect: Dialect::BigQuery,
        filtered_aggregate: false,
        catalog: Some("proj".into()),
        schema: Some("sales_ds".into()),
    };
    let sql = render(&country_totals(), opts);
    assert!(sql.contains("FROM `proj`.`sales_ds`.`orders` AS `o`"));
    assert!(sql.contains("SUM(`o`.`amount`) AS `o.order_total`"));
    assert!(sql.contains("GROUP BY `c`.`country`"));
}

#[test]
fn test_filtered_aggregate_uses_filter_clause_when_supported() {
    let mut request = country_totals();
    request.measures = vec!["o.completed_total".into()];
    let opts = RenderOptions {
        dialect: Dialect::DuckDb,
        filtered_aggregate: true,
        catalog: None,
        schema: None,
    };
    let sql = render(&request, opts);
    assert!(sql.contains(
        "SUM(\"o\".\"amount\") FILTER (WHERE \"o\".\"status\" = 'complete') AS \"o.completed_total\""
    ));
}

#[test]
fn test_filtered_aggregate_case_fallback() {
    let mut request = country_totals();
    request.measures = vec!["o.completed_total".into()];
    let opts = RenderOptions {
        dialect: Dialect::DuckDb,
        filtered_aggregate: false,
        catalog: None,
        schema: None,
    };
    let sql = render(&request, opts);
    assert!(sql.contains(
        "SUM(CASE WHEN \"o\".\"status\" = 'complete' THEN \"o\".\"amount\" END) AS \"o.completed_total\""
    ));
    assert!(!sql.contains("FILTER (WHERE"));
}

#[test]
fn test_bigquery_never_emits_filter_clause() {
    let mut request = country_totals();
    request.measures = vec!["o.completed_total".into()];
    let opts = RenderOptions {
        dialect: Dialect::BigQuery,
        filtered_aggregate: false,
        catalog: Some("proj".into()),
        schema: Some("sales_ds".into()),
    };
    let sql = render(&request, opts);
    assert!(sql.contains("SUM(CASE WHEN `o`.`status` = 'complete' THEN `o`.`amount` END)"));
    assert!(!sql.contains("FILTER (WHERE"));
}

#[test]
fn test_ilike_native_on_postgres_and_duckdb() {
    let mut request = country_totals();
    request.filters = vec![Filter::new("o.status", FilterOp::ILike, json!("comp%"))];
    let duck = render(
        &request,
        RenderOptions {
            dialect: Dialect::DuckDb,
            filtered_aggregate: true,
            catalog: None,
            schema: None,
        },
    );
    assert!(duck.contains("\"o\".\"status\" ILIKE 'comp%'"));

    let pg = render(
        &request,
        RenderOptions {
            dialect: Dialect::Postgres,
            filtered_aggregate: true,
            catalog: None,
            schema: Some("public".into()),
        },
    );
    assert!(pg.contains("\"o\".\"status\" ILIKE 'comp%'"));
}

#[test]
fn test_ilike_rewritten_on_bigquery() {
    let mut request = country_totals();
    request.filters = vec![Filter::new("o.status", FilterOp::ILike, json!("comp%"))];
    let sql = render(
        &request,
        RenderOptions {
            dialect: Dialect::BigQuery,
            filtered_aggregate: false,
            catalog: Some("proj".into()),
            schema: Some("sales_ds".into()),
        },
    );
    assert!(sql.contains("LOWER(`o`.`status`) LIKE LOWER('comp%')"));
    assert!(!sql.contains("ILIKE"));
}

#[test]
fn test_same_request_same_sql_per_dialect() {
    let request = country_totals();
    let opts = || RenderOptions {
        dialect: Dialect::BigQuery,
        filtered_aggregate: false,
        catalog: Some("proj".into()),
        schema: Some("sales_ds".into()),
    };
    assert_eq!(render(&request, opts()), render(&request, opts()));
}
