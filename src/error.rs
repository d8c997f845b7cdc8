//! Error types for the query pipeline.
//!
//! A single enum covers every failure from handle construction through
//! backend execution, ordered roughly by pipeline stage. Each variant
//! carries a human-readable message and, where one exists, the offending
//! field name.

use thiserror::Error;

/// Result type for catalog, planning, rendering, and execution operations.
pub type FlowResult<T> = Result<T, FlowError>;

/// Errors produced by the query pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    /// The catalog failed cross-entity validation at handle construction.
    #[error("invalid catalog: {0}")]
    CatalogInvalid(String),

    /// The requested flow is not registered.
    #[error("unknown flow '{0}'")]
    UnknownFlow(String),

    /// A referenced field does not exist in the flow's scope.
    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    /// An unqualified field name matches more than one alias.
    #[error("ambiguous field '{field}' - matches: {}; qualify it", .candidates.join(", "))]
    Ambiguous {
        field: String,
        candidates: Vec<String>,
    },

    /// A field or filter value was used with an incompatible type.
    #[error("type mismatch on '{field}': {message}")]
    TypeMismatch { field: String, message: String },

    /// An operator was applied to a field that does not support it.
    #[error("unsupported operation on '{field}': {message}")]
    UnsupportedOp { field: String, message: String },

    /// The pagination parameters are inconsistent or the cursor is invalid.
    #[error("malformed pagination: {0}")]
    MalformedPagination(String),

    /// The request cannot be planned at the required grain.
    #[error("plan infeasible: {0}")]
    PlanInfeasible(String),

    /// SQL emission failed.
    #[error("render failure: {0}")]
    RenderFailure(String),

    /// The backend reported an error; the underlying message is preserved.
    #[error("backend failure: {0}")]
    BackendFailure(String),
}

impl FlowError {
    /// Shorthand for a [`FlowError::CatalogInvalid`].
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::CatalogInvalid(message.into())
    }

    /// Shorthand for a [`FlowError::BackendFailure`] wrapping another error.
    pub fn backend(message: impl ToString) -> Self {
        Self::BackendFailure(message.to_string())
    }

    /// Shorthand for a [`FlowError::RenderFailure`].
    pub fn render(message: impl Into<String>) -> Self {
        Self::RenderFailure(message.into())
    }

    /// The field name this error is about, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::UnknownField { field }
            | Self::Ambiguous { field, .. }
            | Self::TypeMismatch { field, .. }
            | Self::UnsupportedOp { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Whether this error is a request-validation failure (as opposed to a
    /// catalog, rendering, or backend problem).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownFlow(_)
                | Self::UnknownField { .. }
                | Self::Ambiguous { .. }
                | Self::TypeMismatch { .. }
                | Self::UnsupportedOp { .. }
                | Self::MalformedPagination(_)
        )
    }
}
