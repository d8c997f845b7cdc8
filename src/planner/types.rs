//! Request payload types - the validator's input.
//!
//! These mirror the JSON wire shape accepted by `POST /flows/{flow}/query`;
//! everything but `flow` is optional.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::types::FilterOp;

/// A structured query over one flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Flow name. The HTTP layer fills this from the path segment.
    #[serde(default)]
    pub flow: String,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub measures: Vec<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl QueryRequest {
    pub fn for_flow(flow: impl Into<String>) -> Self {
        Self {
            flow: flow.into(),
            ..Default::default()
        }
    }
}

/// A row-level filter on a dimension field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    #[serde(default)]
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

/// Sort direction for result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY entry; `column` must be a requested dimension or measure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderItem {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}
