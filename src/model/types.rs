//! Core value types shared by the catalog and the request layer.

use serde::{Deserialize, Serialize};

/// Declared data type of a dimension, used for schema export.
///
/// Types are advisory: the planner never coerces values, but the declared
/// type is surfaced by the flow-schema endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Bool,
    Int32,
    Int64,
    Float64,
    Decimal,
    String,
    Date,
    Time,
    Timestamp,
    TimestampTz,
}

impl DataType {
    /// Parse a type string like "bigint" or "timestamptz".
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "bool" | "boolean" => Some(DataType::Bool),
            "int32" | "int" | "integer" => Some(DataType::Int32),
            "int64" | "bigint" => Some(DataType::Int64),
            "float64" | "float" | "double" | "real" => Some(DataType::Float64),
            "decimal" | "numeric" => Some(DataType::Decimal),
            "string" | "text" | "varchar" => Some(DataType::String),
            "date" => Some(DataType::Date),
            "time" => Some(DataType::Time),
            "timestamp" | "datetime" => Some(DataType::Timestamp),
            "timestamptz" => Some(DataType::TimestampTz),
            _ => None,
        }
    }

    /// Canonical lowercase name, as exported by the schema endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float64 => "float64",
            DataType::Decimal => "decimal",
            DataType::String => "string",
            DataType::Date => "date",
            DataType::Time => "time",
            DataType::Timestamp => "timestamp",
            DataType::TimestampTz => "timestamptz",
        }
    }
}

/// Aggregation applied by an aggregate measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Count,
    CountDistinct,
    Min,
    Max,
    Avg,
}

impl Aggregation {
    /// The SQL function this aggregation renders to.
    pub fn sql_function(&self) -> &'static str {
        match self {
            Aggregation::Sum => "SUM",
            Aggregation::Count | Aggregation::CountDistinct => "COUNT",
            Aggregation::Min => "MIN",
            Aggregation::Max => "MAX",
            Aggregation::Avg => "AVG",
        }
    }

    /// Whether partial results of this aggregation can be combined by an
    /// outer aggregate. `avg` and `count_distinct` partials do not compose,
    /// which makes them unusable under a pre-aggregate plan.
    pub fn reaggregates(&self) -> bool {
        !matches!(self, Aggregation::Avg | Aggregation::CountDistinct)
    }

    /// The outer aggregation that combines partials of this aggregation.
    /// Partial counts are combined by summation.
    pub fn reaggregation(&self) -> Aggregation {
        match self {
            Aggregation::Sum | Aggregation::Count => Aggregation::Sum,
            Aggregation::Min => Aggregation::Min,
            Aggregation::Max => Aggregation::Max,
            other => *other,
        }
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Aggregation::Sum => write!(f, "sum"),
            Aggregation::Count => write!(f, "count"),
            Aggregation::CountDistinct => write!(f, "count_distinct"),
            Aggregation::Min => write!(f, "min"),
            Aggregation::Max => write!(f, "max"),
            Aggregation::Avg => write!(f, "avg"),
        }
    }
}

/// Comparison operator accepted by request and measure filters.
///
/// Serde spellings match the wire payload (`"=="`, `"not in"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "ilike")]
    ILike,
}

impl FilterOp {
    /// Whether this operator takes a sequence value (`in` / `not in`).
    pub fn takes_sequence(&self) -> bool {
        matches!(self, FilterOp::In | FilterOp::NotIn)
    }

    /// Whether this operator matches string patterns (`like` / `ilike`).
    pub fn is_pattern(&self) -> bool {
        matches!(self, FilterOp::Like | FilterOp::ILike)
    }
}
