//! Error types for feature reconciliation and estimation

use serde::Serialize;
use thiserror::Error;

/// Violations of the feature contract between user input, the fitted
/// encoding/scaling pipeline and the trained models.
///
/// Every variant is recoverable at the UI boundary: the request is rejected
/// and the message is shown next to the form instead of a prediction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractError {
    /// A form field was not supplied
    #[error("missing required field '{0}'")]
    MissingField(String),

    /// A field could not be parsed or has the wrong type
    #[error("field '{field}' expects {expected}, got '{value}'")]
    InvalidValue {
        field: String,
        expected: String,
        value: String,
    },

    /// A numeric field lies outside its allowed range
    #[error("field '{field}' must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },

    /// A numeric value is NaN or infinite
    #[error("field '{0}' must be a finite number")]
    NonFiniteValue(String),

    /// Categorical value the encoder (or form) has never seen
    #[error("unknown value '{value}' for '{column}' (known: {known})")]
    UnknownCategory {
        column: String,
        value: String,
        known: String,
    },

    /// Categorical column without a fitted encoder
    #[error("no fitted encoder for categorical column '{0}'")]
    MissingEncoder(String),

    /// A pipeline stage expects a column the input does not provide
    #[error("{stage} expects column '{column}' which the input does not provide")]
    MissingColumn { stage: String, column: String },

    /// The input provides a column the model was not trained on
    #[error("column '{0}' is not part of the trained feature contract")]
    UnexpectedColumn(String),

    /// The same column was produced twice
    #[error("column '{0}' appears more than once")]
    DuplicateColumn(String),

    /// Vector length differs from what a scaler or model was fitted on
    #[error("{stage} expects {expected} features, got {actual}")]
    FeatureCountMismatch {
        stage: String,
        expected: usize,
        actual: usize,
    },

    /// An artifact is internally inconsistent
    #[error("artifact '{artifact}' is invalid: {reason}")]
    InvalidArtifact { artifact: String, reason: String },
}

impl ContractError {
    /// Short machine-readable kind, used for API responses and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ContractError::MissingField(_) => "missing_field",
            ContractError::InvalidValue { .. } => "invalid_value",
            ContractError::OutOfRange { .. } => "out_of_range",
            ContractError::NonFiniteValue(_) => "non_finite_value",
            ContractError::UnknownCategory { .. } => "unknown_category",
            ContractError::MissingEncoder(_) => "missing_encoder",
            ContractError::MissingColumn { .. } => "missing_column",
            ContractError::UnexpectedColumn(_) => "unexpected_column",
            ContractError::DuplicateColumn(_) => "duplicate_column",
            ContractError::FeatureCountMismatch { .. } => "feature_count_mismatch",
            ContractError::InvalidArtifact { .. } => "invalid_artifact",
        }
    }

    /// The field or column the error refers to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            ContractError::MissingField(f)
            | ContractError::NonFiniteValue(f)
            | ContractError::MissingEncoder(f)
            | ContractError::UnexpectedColumn(f)
            | ContractError::DuplicateColumn(f) => Some(f),
            ContractError::InvalidValue { field, .. } | ContractError::OutOfRange { field, .. } => {
                Some(field)
            }
            ContractError::UnknownCategory { column, .. }
            | ContractError::MissingColumn { column, .. } => Some(column),
            ContractError::FeatureCountMismatch { .. } | ContractError::InvalidArtifact { .. } => {
                None
            }
        }
    }

    pub(crate) fn invalid_artifact(artifact: &str, reason: impl Into<String>) -> Self {
        ContractError::InvalidArtifact {
            artifact: artifact.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors produced by a full estimation request
#[derive(Debug, Error)]
pub enum EstimateError {
    /// The input does not satisfy the feature contract
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// A model failed while scoring a valid feature vector
    #[error("model '{model}' failed: {message}")]
    Model { model: String, message: String },
}

impl EstimateError {
    pub fn kind(&self) -> &'static str {
        match self {
            EstimateError::Contract(e) => e.kind(),
            EstimateError::Model { .. } => "model_failure",
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            EstimateError::Contract(e) => e.field(),
            EstimateError::Model { .. } => None,
        }
    }

    /// Whether the failure was caused by the submitted input
    pub fn is_validation(&self) -> bool {
        matches!(self, EstimateError::Contract(_))
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            kind: self.kind().to_string(),
            field: self.field().map(str::to_string),
        }
    }
}

/// JSON body returned for rejected requests
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    pub field: Option<String>,
}
