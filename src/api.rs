//! HTTP query surface (feature `api`).
//!
//! Three endpoints over a [`FlowHandle`]:
//!
//! - `GET /flows` - flow names and descriptions
//! - `GET /flows/{flow}` - a flow's schema
//! - `POST /flows/{flow}/query` - execute a query payload
//!
//! Validation failures map to 400, unknown flows to 404, and backend
//! errors to 500.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::error::FlowError;
use crate::exec::QueryOutcome;
use crate::handle::FlowHandle;
use crate::planner::types::QueryRequest;

/// Build the router exposing the three flow endpoints.
pub fn router(handle: FlowHandle) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/flows", get(list_flows))
        .route("/flows/{flow}", get(describe_flow))
        .route("/flows/{flow}/query", post(query_flow))
        .layer(cors)
        .with_state(handle)
}

/// Serve the router until the process is stopped.
pub async fn serve(handle: FlowHandle, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(handle);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    println!("semaflow listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Error wrapper mapping [`FlowError`] kinds onto HTTP statuses.
struct ApiError(FlowError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            FlowError::UnknownFlow(_) => StatusCode::NOT_FOUND,
            FlowError::BackendFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        let body = json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        ApiError(err)
    }
}

async fn list_flows(State(handle): State<FlowHandle>) -> Json<Value> {
    let flows: Map<String, Value> = handle
        .list_flows()
        .into_iter()
        .map(|f| (f.name, f.description.map(Value::String).unwrap_or(Value::Null)))
        .collect();
    Json(json!({ "flows": flows }))
}

async fn describe_flow(
    State(handle): State<FlowHandle>,
    Path(flow): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let schema = handle.get_flow(&flow)?;
    let field_map = |fields: Vec<crate::handle::FieldSchema>| -> Map<String, Value> {
        fields
            .into_iter()
            .map(|f| {
                (
                    f.qualified_name,
                    json!({ "description": f.description, "data_type": f.data_type }),
                )
            })
            .collect()
    };
    Ok(Json(json!({
        "name": schema.name,
        "description": schema.description,
        "time_dimension": schema.time_dimension,
        "dimensions": field_map(schema.dimensions),
        "measures": field_map(schema.measures),
    })))
}

async fn query_flow(
    State(handle): State<FlowHandle>,
    Path(flow): Path<String>,
    Json(mut request): Json<QueryRequest>,
) -> Result<Json<Value>, ApiError> {
    request.flow = flow;
    let outcome = handle.execute(&request).await?;
    let body = match outcome {
        QueryOutcome::Rows(rows) => json!({ "rows": rows }),
        QueryOutcome::Page {
            rows,
            cursor,
            has_more,
        } => json!({ "rows": rows, "cursor": cursor, "has_more": has_more }),
    };
    Ok(Json(body))
}
