//! Backend clients and the connection registry.
//!
//! A [`Backend`] executes a rendered SQL string and streams rows back as
//! column names plus positional values. Clients are thread-safe and own
//! whatever pooling their driver needs; the registry maps data-source names
//! to clients and is immutable after handle construction.

pub mod bigquery;
pub mod duckdb;
pub mod postgres;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FlowError, FlowResult};
use crate::sql::dialect::Dialect;

pub use bigquery::BigQueryBackend;
pub use duckdb::DuckDbBackend;
pub use postgres::PostgresBackend;

/// Result of one backend execution: the output column names and each row's
/// values in the same positional order.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// What a backend advertises to the renderer.
#[derive(Debug, Clone)]
pub struct BackendCapabilities {
    pub dialect: Dialect,
    /// Whether `AGG(x) FILTER (WHERE ...)` is available.
    pub filtered_aggregate: bool,
    /// Catalog-level table qualifier (BigQuery project).
    pub catalog: Option<String>,
    /// Schema-level table qualifier (Postgres schema, BigQuery dataset).
    pub schema: Option<String>,
}

/// A data-source client: executes SQL, advertises its dialect profile.
#[async_trait]
pub trait Backend: Send + Sync {
    fn capabilities(&self) -> &BackendCapabilities;

    /// Execute one statement. Backend errors are surfaced verbatim in the
    /// message, wrapped as `BackendFailure`. No retries happen here.
    async fn execute(&self, sql: &str) -> FlowResult<RowSet>;
}

/// Descriptor for a backend connection. Construction of the actual client
/// happens when the registry is built (embedded sources) or lazily on
/// first use (network sources).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DataSource {
    /// In-process embedded DuckDB. `path` may be `:memory:`.
    DuckDb {
        name: String,
        path: String,
        /// Statements run once when the connection opens (attach files,
        /// create views, seed fixtures).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        init_sql: Option<String>,
    },
    /// Client/server PostgreSQL. The schema is required: rendered table
    /// references are always schema-qualified.
    Postgres {
        name: String,
        connection_string: String,
        schema: String,
    },
    /// BigQuery over its REST API. The bearer token comes from
    /// `auth_token` or the `SEMAFLOW_BIGQUERY_TOKEN` environment variable.
    BigQuery {
        name: String,
        project: String,
        dataset: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auth_token: Option<String>,
    },
}

impl DataSource {
    pub fn duckdb(path: impl Into<String>, name: impl Into<String>) -> Self {
        DataSource::DuckDb {
            name: name.into(),
            path: path.into(),
            init_sql: None,
        }
    }

    pub fn duckdb_with_init(
        path: impl Into<String>,
        name: impl Into<String>,
        init_sql: impl Into<String>,
    ) -> Self {
        DataSource::DuckDb {
            name: name.into(),
            path: path.into(),
            init_sql: Some(init_sql.into()),
        }
    }

    pub fn postgres(
        connection_string: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        DataSource::Postgres {
            name: name.into(),
            connection_string: connection_string.into(),
            schema: schema.into(),
        }
    }

    pub fn bigquery(
        project: impl Into<String>,
        dataset: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        DataSource::BigQuery {
            name: name.into(),
            project: project.into(),
            dataset: dataset.into(),
            auth_token: None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DataSource::DuckDb { name, .. }
            | DataSource::Postgres { name, .. }
            | DataSource::BigQuery { name, .. } => name,
        }
    }

    /// The dialect a flow bound to this source renders with.
    pub fn dialect(&self) -> Dialect {
        match self {
            DataSource::DuckDb { .. } => Dialect::DuckDb,
            DataSource::Postgres { .. } => Dialect::Postgres,
            DataSource::BigQuery { .. } => Dialect::BigQuery,
        }
    }
}

/// Keyed, concurrency-safe map of data-source name to backend client.
///
/// Built once during handle construction and closed with it; the only
/// mutable state lives inside the clients' own pools.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    backends: HashMap<String, Arc<dyn Backend>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients for a set of descriptors.
    pub fn from_sources(sources: Vec<DataSource>) -> FlowResult<Self> {
        let mut registry = Self::new();
        for source in sources {
            let name = source.name().to_string();
            let backend: Arc<dyn Backend> = match source {
                DataSource::DuckDb { path, init_sql, .. } => {
                    Arc::new(DuckDbBackend::open(&path, init_sql.as_deref())?)
                }
                DataSource::Postgres {
                    connection_string,
                    schema,
                    ..
                } => Arc::new(PostgresBackend::new(connection_string, schema)),
                DataSource::BigQuery {
                    project,
                    dataset,
                    auth_token,
                    ..
                } => Arc::new(BigQueryBackend::new(project, dataset, auth_token)),
            };
            registry.register(name, backend)?;
        }
        Ok(registry)
    }

    /// Register a client under a data-source name. Rejects duplicates.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        backend: Arc<dyn Backend>,
    ) -> FlowResult<()> {
        let name = name.into();
        if self.backends.insert(name.clone(), backend).is_some() {
            return Err(FlowError::catalog(format!(
                "duplicate data source '{}'",
                name
            )));
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> FlowResult<&Arc<dyn Backend>> {
        self.backends.get(name).ok_or_else(|| {
            FlowError::BackendFailure(format!("no backend registered for data source '{}'", name))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("data_sources", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}
