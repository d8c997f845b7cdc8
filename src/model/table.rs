//! Semantic tables: logical tables exporting dimensions and measures.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FlowError, FlowResult};
use crate::model::types::{Aggregation, DataType, FilterOp};

/// A row-level grouping/filtering field exported by a semantic table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Physical column or SQL expression over the table's columns.
    pub expr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
}

impl Dimension {
    pub fn new(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            description: None,
            data_type: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }
}

/// Row-level predicate attached to an aggregate measure.
///
/// `field` names a dimension on the measure's own table; the predicate is
/// rendered as a filtered aggregate (`FILTER (WHERE ...)` or the CASE
/// fallback, depending on backend capability).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureFilter {
    pub field: String,
    pub op: FilterOp,
    #[serde(default)]
    pub value: Value,
}

/// An aggregate or derived field exported by a semantic table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Measure {
    /// An aggregation over a physical expression, optionally filtered.
    Aggregate {
        expr: String,
        agg: Aggregation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<MeasureFilter>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// An expression over other measures, referenced by qualified name.
    Derived {
        post_expr: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl Measure {
    pub fn aggregate(expr: impl Into<String>, agg: Aggregation) -> Self {
        Measure::Aggregate {
            expr: expr.into(),
            agg,
            filter: None,
            description: None,
        }
    }

    pub fn derived(post_expr: impl Into<String>) -> Self {
        Measure::Derived {
            post_expr: post_expr.into(),
            description: None,
        }
    }

    pub fn with_filter(self, filter: MeasureFilter) -> Self {
        match self {
            Measure::Aggregate {
                expr,
                agg,
                description,
                ..
            } => Measure::Aggregate {
                expr,
                agg,
                filter: Some(filter),
                description,
            },
            derived => derived,
        }
    }

    pub fn with_description(self, text: impl Into<String>) -> Self {
        match self {
            Measure::Aggregate {
                expr, agg, filter, ..
            } => Measure::Aggregate {
                expr,
                agg,
                filter,
                description: Some(text.into()),
            },
            Measure::Derived { post_expr, .. } => Measure::Derived {
                post_expr,
                description: Some(text.into()),
            },
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, Measure::Derived { .. })
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Measure::Aggregate { description, .. } | Measure::Derived { description, .. } => {
                description.as_deref()
            }
        }
    }
}

/// A logical table bound to one data source.
///
/// Dimensions and measures are keyed by their local names; within a flow
/// they are addressed as `alias.name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticTable {
    pub name: String,
    /// Key of the data source this table lives in.
    pub data_source: String,
    /// Physical table identifier.
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    /// Name of the dimension that carries this table's time axis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_dimension: Option<String>,
    #[serde(default)]
    pub dimensions: BTreeMap<String, Dimension>,
    #[serde(default)]
    pub measures: BTreeMap<String, Measure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SemanticTable {
    /// Structural validation: non-empty identifiers, no dimension/measure
    /// name collisions, time dimension and measure filters resolve locally.
    /// Cross-entity invariants are checked at handle build.
    pub fn validate_structure(&self) -> FlowResult<()> {
        if self.name.is_empty() {
            return Err(FlowError::catalog("semantic table with empty name"));
        }
        if self.table.is_empty() {
            return Err(FlowError::catalog(format!(
                "table '{}' has an empty physical table name",
                self.name
            )));
        }
        if self.data_source.is_empty() {
            return Err(FlowError::catalog(format!(
                "table '{}' has an empty data source name",
                self.name
            )));
        }
        for name in self.measures.keys() {
            if self.dimensions.contains_key(name) {
                return Err(FlowError::catalog(format!(
                    "table '{}' exports '{}' as both a dimension and a measure",
                    self.name, name
                )));
            }
        }
        if let Some(td) = &self.time_dimension {
            if !self.dimensions.contains_key(td) {
                return Err(FlowError::catalog(format!(
                    "table '{}' names time dimension '{}' which is not a dimension",
                    self.name, td
                )));
            }
        }
        for (name, measure) in &self.measures {
            if let Measure::Aggregate {
                filter: Some(filter),
                ..
            } = measure
            {
                if !self.dimensions.contains_key(&filter.field) {
                    return Err(FlowError::catalog(format!(
                        "measure '{}.{}' filters on '{}' which is not a dimension of '{}'",
                        self.name, name, filter.field, self.name
                    )));
                }
            }
        }
        Ok(())
    }
}
