//! Client/server PostgreSQL backend.
//!
//! Connects lazily on first use via `tokio-postgres`; the driver's client
//! is already thread-safe and pipelines statements internally. The
//! connection task runs in the background until the handle is dropped.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio_postgres::types::Type;
use tokio_postgres::{Client, NoTls, Row};

use super::{Backend, BackendCapabilities, RowSet};
use crate::error::{FlowError, FlowResult};
use crate::sql::dialect::Dialect;

/// PostgreSQL client over a connection string.
pub struct PostgresBackend {
    connection_string: String,
    client: OnceCell<Client>,
    caps: BackendCapabilities,
}

impl PostgresBackend {
    pub fn new(connection_string: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            client: OnceCell::new(),
            caps: BackendCapabilities {
                dialect: Dialect::Postgres,
                filtered_aggregate: true,
                catalog: None,
                schema: Some(schema.into()),
            },
        }
    }

    async fn client(&self) -> FlowResult<&Client> {
        self.client
            .get_or_try_init(|| async {
                let (client, connection) =
                    tokio_postgres::connect(&self.connection_string, NoTls)
                        .await
                        .map_err(FlowError::backend)?;
                // The connection object drives the socket; it finishes when
                // the client is dropped.
                tokio::spawn(async move {
                    let _ = connection.await;
                });
                Ok(client)
            })
            .await
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    fn capabilities(&self) -> &BackendCapabilities {
        &self.caps
    }

    async fn execute(&self, sql: &str) -> FlowResult<RowSet> {
        let client = self.client().await?;
        // Prepare first so column metadata exists even for empty results.
        let statement = client.prepare(sql).await.map_err(FlowError::backend)?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let rows = client
            .query(&statement, &[])
            .await
            .map_err(FlowError::backend)?;

        let mut data = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                record.push(pg_value_to_json(row, i)?);
            }
            data.push(record);
        }
        Ok(RowSet {
            columns,
            rows: data,
        })
    }
}

fn pg_value_to_json(row: &Row, idx: usize) -> FlowResult<Value> {
    let ty = row.columns()[idx].type_().clone();
    let value = if ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)
            .map_err(FlowError::backend)?
            .map(Value::Bool)
    } else if ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)
            .map_err(FlowError::backend)?
            .map(Value::from)
    } else if ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)
            .map_err(FlowError::backend)?
            .map(Value::from)
    } else if ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)
            .map_err(FlowError::backend)?
            .map(Value::from)
    } else if ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)
            .map_err(FlowError::backend)?
            .map(|f| Value::from(f as f64))
    } else if ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)
            .map_err(FlowError::backend)?
            .map(Value::from)
    } else if ty == Type::TEXT || ty == Type::VARCHAR || ty == Type::BPCHAR || ty == Type::NAME {
        row.try_get::<_, Option<String>>(idx)
            .map_err(FlowError::backend)?
            .map(Value::String)
    } else {
        // Types without a direct mapping (NUMERIC, dates, ...) come back
        // as their text form.
        match row.try_get::<_, Option<String>>(idx) {
            Ok(v) => v.map(Value::String),
            Err(e) => return Err(FlowError::backend(format!("column type {}: {}", ty, e))),
        }
    };
    Ok(value.unwrap_or(Value::Null))
}
