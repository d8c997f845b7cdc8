#[path = "../support/mod.rs"]
mod support;

use semaflow::error::FlowError;
use semaflow::model::catalog::Catalog;
use semaflow::planner::resolve::validate_request;
use semaflow::planner::types::{OrderItem, QueryRequest};
use semaflow::planner::Pagination;

fn catalog() -> Catalog {
    Catalog::build(vec![support::orders_table()], vec![support::simple_flow()]).unwrap()
}

fn status_request() -> QueryRequest {
    let mut request = QueryRequest::for_flow("simple_orders");
    request.dimensions = vec!["o.status".into()];
    request.measures = vec!["o.order_total".into()];
    request
}

#[test]
fn test_no_pagination() {
    let catalog = catalog();
    let ctx = catalog.flow("simple_orders").unwrap();
    let resolved = validate_request(ctx, &status_request()).unwrap();
    assert_eq!(resolved.pagination, Pagination::None);
}

#[test]
fn test_limit_offset_family() {
    let catalog = catalog();
    let ctx = catalog.flow("simple_orders").unwrap();
    let mut request = status_request();
    request.limit = Some(10);
    request.offset = Some(5);
    let resolved = validate_request(ctx, &request).unwrap();
    assert_eq!(
        resolved.pagination,
        Pagination::LimitOffset {
            limit: Some(10),
            offset: Some(5)
        }
    );
}

#[test]
fn test_families_are_mutually_exclusive() {
    let catalog = catalog();
    let ctx = catalog.flow("simple_orders").unwrap();
    let mut request = status_request();
    request.limit = Some(10);
    request.page_size = Some(5);
    assert!(matches!(
        validate_request(ctx, &request),
        Err(FlowError::MalformedPagination(_))
    ));
}

#[test]
fn test_cursor_requires_page_size() {
    let catalog = catalog();
    let ctx = catalog.flow("simple_orders").unwrap();
    let mut request = status_request();
    request.cursor = Some("opaque".into());
    assert!(matches!(
        validate_request(ctx, &request),
        Err(FlowError::MalformedPagination(_))
    ));
}

#[test]
fn test_page_size_must_be_positive() {
    let catalog = catalog();
    let ctx = catalog.flow("simple_orders").unwrap();
    let mut request = status_request();
    request.page_size = Some(0);
    assert!(matches!(
        validate_request(ctx, &request),
        Err(FlowError::MalformedPagination(_))
    ));
}

#[test]
fn test_cursor_cannot_order_by_measure() {
    let catalog = catalog();
    let ctx = catalog.flow("simple_orders").unwrap();
    let mut request = status_request();
    request.page_size = Some(1);
    request.order = vec![OrderItem::desc("o.order_total")];
    assert!(matches!(
        validate_request(ctx, &request),
        Err(FlowError::MalformedPagination(_))
    ));
}

#[test]
fn test_cursor_mode_with_dimension_order() {
    let catalog = catalog();
    let ctx = catalog.flow("simple_orders").unwrap();
    let mut request = status_request();
    request.page_size = Some(1);
    request.order = vec![OrderItem::desc("o.status")];
    let resolved = validate_request(ctx, &request).unwrap();
    assert!(resolved.pagination.is_cursor());
}
