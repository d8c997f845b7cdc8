//! BigQuery backend over the REST API.
//!
//! Submits statements to the synchronous `jobs.query` endpoint. The bearer
//! token comes from the data-source descriptor or the
//! `SEMAFLOW_BIGQUERY_TOKEN` environment variable; obtaining and refreshing
//! credentials is the operator's concern.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Backend, BackendCapabilities, RowSet};
use crate::error::{FlowError, FlowResult};
use crate::sql::dialect::Dialect;

/// Environment variable consulted when no token is configured.
pub const BIGQUERY_TOKEN_ENV: &str = "SEMAFLOW_BIGQUERY_TOKEN";

const API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// BigQuery REST client for one project/dataset.
pub struct BigQueryBackend {
    project: String,
    auth_token: Option<String>,
    client: reqwest::Client,
    caps: BackendCapabilities,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequestBody<'a> {
    query: &'a str,
    use_legacy_sql: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    schema: Option<TableSchema>,
    rows: Option<Vec<TableRow>>,
    job_complete: Option<bool>,
    errors: Option<Vec<JobError>>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    fields: Vec<TableField>,
}

#[derive(Debug, Deserialize)]
struct TableField {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    v: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JobError {
    message: String,
}

impl BigQueryBackend {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        auth_token: Option<String>,
    ) -> Self {
        let project = project.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("HTTP client for BigQuery");
        Self {
            caps: BackendCapabilities {
                dialect: Dialect::BigQuery,
                filtered_aggregate: false,
                catalog: Some(project.clone()),
                schema: Some(dataset.into()),
            },
            project,
            auth_token,
            client,
        }
    }

    fn token(&self) -> FlowResult<String> {
        if let Some(token) = &self.auth_token {
            return Ok(token.clone());
        }
        std::env::var(BIGQUERY_TOKEN_ENV).map_err(|_| {
            FlowError::backend(format!(
                "no BigQuery credentials: set {} or configure auth_token",
                BIGQUERY_TOKEN_ENV
            ))
        })
    }
}

#[async_trait]
impl Backend for BigQueryBackend {
    fn capabilities(&self) -> &BackendCapabilities {
        &self.caps
    }

    async fn execute(&self, sql: &str) -> FlowResult<RowSet> {
        let url = format!("{}/projects/{}/queries", API_BASE, self.project);
        let body = QueryRequestBody {
            query: sql,
            use_legacy_sql: false,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.token()?)
            .json(&body)
            .send()
            .await
            .map_err(FlowError::backend)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FlowError::backend(format!(
                "bigquery returned {}: {}",
                status, text
            )));
        }

        let payload: QueryResponse = response.json().await.map_err(FlowError::backend)?;
        if let Some(errors) = &payload.errors {
            if let Some(first) = errors.first() {
                return Err(FlowError::backend(format!("bigquery: {}", first.message)));
            }
        }
        if payload.job_complete == Some(false) {
            return Err(FlowError::backend(
                "bigquery job did not complete within the request deadline",
            ));
        }

        let fields = payload.schema.map(|s| s.fields).unwrap_or_default();
        let columns: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
        let mut rows = Vec::new();
        for row in payload.rows.unwrap_or_default() {
            let mut record = Vec::with_capacity(fields.len());
            for (i, cell) in row.f.into_iter().enumerate() {
                let field_type = fields.get(i).map(|f| f.field_type.as_str()).unwrap_or("");
                record.push(bq_cell_to_json(cell.v, field_type));
            }
            rows.push(record);
        }

        Ok(RowSet { columns, rows })
    }
}

/// BigQuery serializes every cell value as a string; convert by the
/// declared field type.
fn bq_cell_to_json(value: Option<Value>, field_type: &str) -> Value {
    let Some(value) = value else {
        return Value::Null;
    };
    let Value::String(text) = value else {
        return value;
    };
    match field_type {
        "INTEGER" | "INT64" => text
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::String(text)),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => text
            .parse::<f64>()
            .map(Value::from)
            .unwrap_or(Value::String(text)),
        "BOOLEAN" | "BOOL" => match text.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text),
        },
        _ => Value::String(text),
    }
}
