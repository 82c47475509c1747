//! Fitted numeric scaler

use crate::error::ContractError;
use serde::{Deserialize, Serialize};

/// A scaler fitted on the numeric training columns.
///
/// `Standard` computes `(x - mean) / scale`, `MinMax` computes
/// `x * scale + min`. A zero scale is treated as 1.0, as the fitting
/// library does for constant columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    Standard {
        feature_names: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    },
    MinMax {
        feature_names: Vec<String>,
        min: Vec<f64>,
        scale: Vec<f64>,
    },
}

impl Scaler {
    pub fn from_json(json: &str) -> Result<Self, ContractError> {
        let scaler: Self = serde_json::from_str(json)
            .map_err(|e| ContractError::invalid_artifact("scaler", e.to_string()))?;
        scaler.validate()?;
        Ok(scaler)
    }

    /// Columns the scaler was fitted on, in fitted order
    pub fn feature_names(&self) -> &[String] {
        match self {
            Scaler::Standard { feature_names, .. } | Scaler::MinMax { feature_names, .. } => {
                feature_names
            }
        }
    }

    pub fn n_features(&self) -> usize {
        self.feature_names().len()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Scaler::Standard { .. } => "standard",
            Scaler::MinMax { .. } => "min_max",
        }
    }

    /// Check parameter lengths agree with the fitted columns
    pub fn validate(&self) -> Result<(), ContractError> {
        let (names, offsets, scales) = match self {
            Scaler::Standard {
                feature_names,
                mean,
                scale,
            } => (feature_names, mean, scale),
            Scaler::MinMax {
                feature_names,
                min,
                scale,
            } => (feature_names, min, scale),
        };

        if names.is_empty() {
            return Err(ContractError::invalid_artifact(
                "scaler",
                "no feature names",
            ));
        }
        if offsets.len() != names.len() || scales.len() != names.len() {
            return Err(ContractError::invalid_artifact(
                "scaler",
                format!(
                    "{} feature names but {} offsets and {} scales",
                    names.len(),
                    offsets.len(),
                    scales.len()
                ),
            ));
        }
        if offsets.iter().chain(scales.iter()).any(|v| !v.is_finite()) {
            return Err(ContractError::invalid_artifact(
                "scaler",
                "non-finite parameter",
            ));
        }
        Ok(())
    }

    /// Scale values given in fitted column order
    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>, ContractError> {
        if values.len() != self.n_features() {
            return Err(ContractError::FeatureCountMismatch {
                stage: "scaler".to_string(),
                expected: self.n_features(),
                actual: values.len(),
            });
        }

        let scaled = match self {
            Scaler::Standard { mean, scale, .. } => values
                .iter()
                .zip(mean.iter().zip(scale.iter()))
                .map(|(&x, (&m, &s))| (x - m) / effective_scale(s))
                .collect(),
            Scaler::MinMax { min, scale, .. } => values
                .iter()
                .zip(min.iter().zip(scale.iter()))
                .map(|(&x, (&m, &s))| x * s + m)
                .collect(),
        };

        Ok(scaled)
    }
}

fn effective_scale(scale: f64) -> f64 {
    if scale == 0.0 {
        1.0
    } else {
        scale
    }
}
