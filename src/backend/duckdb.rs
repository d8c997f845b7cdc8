//! Embedded DuckDB backend.
//!
//! Runs an in-process DuckDB database (file-backed or `:memory:`). The
//! connection is not `Sync`, so it sits behind a short-held mutex and every
//! execution is offloaded to the blocking thread pool.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use duckdb::Connection;
use serde_json::Value;

use super::{Backend, BackendCapabilities, RowSet};
use crate::error::{FlowError, FlowResult};
use crate::sql::dialect::Dialect;

/// In-process embedded DuckDB client.
pub struct DuckDbBackend {
    conn: Arc<Mutex<Connection>>,
    caps: BackendCapabilities,
}

impl DuckDbBackend {
    /// Open a database. `init_sql`, when present, runs once on the fresh
    /// connection (attach files, create views, seed fixtures).
    pub fn open(path: &str, init_sql: Option<&str>) -> FlowResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(FlowError::backend)?;

        if let Some(sql) = init_sql {
            conn.execute_batch(sql).map_err(FlowError::backend)?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            caps: BackendCapabilities {
                dialect: Dialect::DuckDb,
                filtered_aggregate: true,
                catalog: None,
                schema: None,
            },
        })
    }
}

#[async_trait]
impl Backend for DuckDbBackend {
    fn capabilities(&self) -> &BackendCapabilities {
        &self.caps
    }

    async fn execute(&self, sql: &str) -> FlowResult<RowSet> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || -> FlowResult<RowSet> {
            let conn = conn
                .lock()
                .map_err(|_| FlowError::backend("duckdb connection mutex poisoned"))?;
            let mut stmt = conn.prepare(&sql).map_err(FlowError::backend)?;

            let mut columns: Vec<String> = Vec::new();
            let mut data: Vec<Vec<Value>> = Vec::new();
            {
                let mut rows = stmt.query([]).map_err(FlowError::backend)?;
                while let Some(row) = rows.next().map_err(FlowError::backend)? {
                    if columns.is_empty() {
                        columns = row
                            .as_ref()
                            .column_names()
                            .into_iter()
                            .map(Into::into)
                            .collect();
                    }
                    let mut record = Vec::with_capacity(columns.len());
                    for i in 0..columns.len() {
                        let value: duckdb::types::Value =
                            row.get(i).map_err(FlowError::backend)?;
                        record.push(duck_value_to_json(value));
                    }
                    data.push(record);
                }
            }
            if columns.is_empty() {
                // Empty result set; the statement has executed, so names
                // are still available.
                columns = stmt.column_names().into_iter().map(Into::into).collect();
            }

            Ok(RowSet {
                columns,
                rows: data,
            })
        })
        .await
        .map_err(|e| FlowError::backend(format!("duckdb task join error: {}", e)))?
    }
}

fn duck_value_to_json(value: duckdb::types::Value) -> Value {
    use duckdb::types::Value as Duck;
    match value {
        Duck::Null => Value::Null,
        Duck::Boolean(b) => Value::Bool(b),
        Duck::TinyInt(i) => Value::from(i),
        Duck::SmallInt(i) => Value::from(i),
        Duck::Int(i) => Value::from(i),
        Duck::BigInt(i) => Value::from(i),
        Duck::HugeInt(i) => i64::try_from(i)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(i.to_string())),
        Duck::UTinyInt(i) => Value::from(i),
        Duck::USmallInt(i) => Value::from(i),
        Duck::UInt(i) => Value::from(i),
        Duck::UBigInt(i) => Value::from(i),
        Duck::Float(f) => Value::from(f as f64),
        Duck::Double(f) => Value::from(f),
        Duck::Text(s) => Value::String(s),
        other => Value::String(format!("{:?}", other)),
    }
}
