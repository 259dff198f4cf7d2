//! Error types for hemocount operations.
//!
//! Configuration problems are caught before any model is built, model
//! inconsistencies before any sampling starts. Sampling quality issues are
//! never errors: they travel with the posterior as
//! [`QualityWarning`](crate::inference::QualityWarning)s.

use thiserror::Error;

/// Main error type for hemocount operations.
///
/// # Examples
///
/// ```
/// use hemocount::error::HemocountError;
///
/// let err = HemocountError::InvalidConfiguration {
///     param: "squares_counted".to_string(),
///     value: "30".to_string(),
///     constraint: "in 1..=25".to_string(),
/// };
/// assert!(err.to_string().contains("squares_counted"));
/// ```
#[derive(Debug, Error)]
pub enum HemocountError {
    /// A configuration value violates its documented constraint.
    #[error("Invalid configuration: {param} = {value}, expected {constraint}")]
    InvalidConfiguration {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// The observed data cannot be produced by the model with nonzero
    /// probability anywhere the prior puts mass.
    #[error("Model inconsistency: {message}")]
    ModelInconsistency {
        /// What made the observation impossible
        message: String,
    },

    /// The sampler could not find a finite starting point.
    #[error("Sampler initialization failed on chain {chain}: {reason}")]
    SamplerInitialization {
        /// Chain index
        chain: usize,
        /// Failure description
        reason: String,
    },

    /// Paired inputs have different lengths.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected length description
        expected: String,
        /// Actual length found
        actual: String,
    },

    /// A trace lookup used a key the model never declared.
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
}

impl HemocountError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid(param: &str, value: impl ToString, constraint: &str) -> Self {
        Self::InvalidConfiguration {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }

    /// Create a dimension mismatch error with descriptive context.
    #[must_use]
    pub fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected}"),
            actual: format!("{actual}"),
        }
    }

    /// Whether this error was raised by synchronous configuration checks.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration { .. } | Self::DimensionMismatch { .. }
        )
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, HemocountError>;
