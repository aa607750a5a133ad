//! Repository error types.

use thiserror::Error;

/// Errors raised by the repository façade and the criteria pipeline.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The model identifier did not resolve to a usable table binding.
    #[error("model `{model}` is not bound to a valid table definition")]
    InvalidModelBinding { model: String },

    /// A registry entry could not be turned into a criterion.
    #[error("criteria `{name}` must resolve to a Criterion instance: {reason}")]
    InvalidCriteriaInstance { name: String, reason: String },

    /// A criterion emitted a control signal the pipeline does not understand.
    #[error("unsupported expression: {kind}")]
    UnsupportedExpression { kind: String },

    #[error("failed to build statement")]
    Statement(#[from] sea_query::error::Error),

    #[error("storage error")]
    Storage(#[from] anyhow::Error),
}

impl RepositoryError {
    pub(crate) fn invalid_criteria(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCriteriaInstance {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias using RepositoryError.
pub type RepositoryResult<T> = Result<T, RepositoryError>;
