#[path = "../support/mod.rs"]
mod support;

use std::net::SocketAddr;

use semaflow::api;
use serde_json::{json, Value};

/// Serve the fixture handle on an ephemeral port and return its address.
async fn spawn_server() -> SocketAddr {
    let handle = support::full_handle();
    let app = api::router(handle);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_list_flows_endpoint() {
    let addr = spawn_server().await;
    let body: Value = reqwest::get(format!("http://{addr}/flows"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let flows = body["flows"].as_object().unwrap();
    assert!(flows.contains_key("sales"));
    assert!(flows.contains_key("simple_orders"));
    assert_eq!(flows["sales"], json!("Sales data for the company"));
}

#[tokio::test]
async fn test_flow_schema_endpoint() {
    let addr = spawn_server().await;
    let body: Value = reqwest::get(format!("http://{addr}/flows/sales"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["name"], json!("sales"));
    assert_eq!(body["time_dimension"], json!("o.created_at"));
    assert!(body["dimensions"].as_object().unwrap().contains_key("c.country"));
    assert!(body["measures"].as_object().unwrap().contains_key("o.order_total"));
}

#[tokio::test]
async fn test_unknown_flow_is_404() {
    let addr = spawn_server().await;
    let response = reqwest::get(format!("http://{addr}/flows/nonexistent"))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn test_query_endpoint_returns_rows() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();
    let body: Value = client
        .post(format!("http://{addr}/flows/sales/query"))
        .json(&json!({
            "dimensions": ["c.country"],
            "measures": ["o.order_total"],
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows = body["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    let us = rows
        .iter()
        .find(|r| r["c.country"] == json!("US"))
        .unwrap();
    assert_eq!(us["o.order_total"].as_f64(), Some(425.0));
}

#[tokio::test]
async fn test_query_validation_failure_is_400() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/flows/sales/query"))
        .json(&json!({
            "dimensions": ["c.nope"],
            "measures": ["o.order_total"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("c.nope"));
}

#[tokio::test]
async fn test_query_pagination_shape() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();
    let body: Value = client
        .post(format!("http://{addr}/flows/simple_orders/query"))
        .json(&json!({
            "dimensions": ["o.status"],
            "measures": ["o.order_total"],
            "page_size": 1,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["rows"].as_array().unwrap().len(), 1);
    assert_eq!(body["has_more"], json!(true));
    let cursor = body["cursor"].as_str().unwrap().to_string();

    let page2: Value = client
        .post(format!("http://{addr}/flows/simple_orders/query"))
        .json(&json!({
            "dimensions": ["o.status"],
            "measures": ["o.order_total"],
            "page_size": 1,
            "cursor": cursor,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page2["has_more"], json!(false));
    assert_ne!(page2["rows"][0]["o.status"], body["rows"][0]["o.status"]);
}
