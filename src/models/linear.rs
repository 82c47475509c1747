//! Linear models: least squares / Lasso / Ridge regression and logistic classification

use crate::error::ContractError;
use serde::{Deserialize, Serialize};

/// Linear regressor `y = intercept + coefficients · x`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    /// Feature names seen at fit time, when the artifact records them
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegressor {
    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    pub fn validate(&self, name: &str) -> Result<(), ContractError> {
        if self.coefficients.is_empty() {
            return Err(ContractError::invalid_artifact(name, "no coefficients"));
        }
        check_names(name, self.feature_names.as_deref(), self.n_features())?;
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ContractError::invalid_artifact(name, "non-finite coefficient"));
        }
        Ok(())
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        self.intercept + dot(&self.coefficients, x)
    }
}

/// Logistic classifier.
///
/// A single coefficient row with two classes is a binary model (sigmoid);
/// otherwise there is one row per class and probabilities come from a softmax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticClassifier {
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub classes: Vec<String>,
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl LogisticClassifier {
    pub fn n_features(&self) -> usize {
        self.coefficients.first().map(Vec::len).unwrap_or(0)
    }

    fn is_binary(&self) -> bool {
        self.coefficients.len() == 1 && self.classes.len() == 2
    }

    pub fn validate(&self, name: &str) -> Result<(), ContractError> {
        if self.classes.len() < 2 {
            return Err(ContractError::invalid_artifact(name, "fewer than two classes"));
        }
        if !self.is_binary() && self.coefficients.len() != self.classes.len() {
            return Err(ContractError::invalid_artifact(
                name,
                format!(
                    "{} coefficient rows for {} classes",
                    self.coefficients.len(),
                    self.classes.len()
                ),
            ));
        }
        if self.intercepts.len() != self.coefficients.len() {
            return Err(ContractError::invalid_artifact(
                name,
                "intercept count differs from coefficient rows",
            ));
        }
        let n = self.n_features();
        if n == 0 || self.coefficients.iter().any(|row| row.len() != n) {
            return Err(ContractError::invalid_artifact(
                name,
                "coefficient rows have inconsistent lengths",
            ));
        }
        check_names(name, self.feature_names.as_deref(), n)
    }

    /// Class probabilities in `classes` order
    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        let logits: Vec<f64> = self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(row, b)| b + dot(row, x))
            .collect();

        if self.is_binary() {
            let p = sigmoid(logits[0]);
            return vec![1.0 - p, p];
        }
        softmax(&logits)
    }
}

pub(crate) fn check_names(
    name: &str,
    feature_names: Option<&[String]>,
    n_features: usize,
) -> Result<(), ContractError> {
    match feature_names {
        Some(names) if names.len() != n_features => Err(ContractError::invalid_artifact(
            name,
            format!(
                "{} feature names for {} features",
                names.len(),
                n_features
            ),
        )),
        _ => Ok(()),
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_predict() {
        let model = LinearRegressor {
            feature_names: None,
            coefficients: vec![2.0, -1.0, 0.0],
            intercept: 10.0,
        };
        assert_eq!(model.predict(&[1.0, 3.0, 100.0]), 9.0);
    }

    #[test]
    fn test_linear_name_count_validated() {
        let model = LinearRegressor {
            feature_names: Some(vec!["Year".into()]),
            coefficients: vec![1.0, 2.0],
            intercept: 0.0,
        };
        assert_eq!(model.validate("lasso").unwrap_err().kind(), "invalid_artifact");
    }

    #[test]
    fn test_binary_logistic() {
        let model = LogisticClassifier {
            feature_names: None,
            classes: vec!["low".into(), "high".into()],
            coefficients: vec![vec![1.0]],
            intercepts: vec![0.0],
        };
        model.validate("clf").unwrap();

        let proba = model.predict_proba(&[0.0]);
        assert_eq!(proba, vec![0.5, 0.5]);
    }

    #[test]
    fn test_multinomial_logistic_sums_to_one() {
        let model = LogisticClassifier {
            feature_names: None,
            classes: vec!["Low".into(), "Medium".into(), "High".into()],
            coefficients: vec![vec![-2.0], vec![0.0], vec![2.0]],
            intercepts: vec![0.0, 0.5, 0.0],
        };
        model.validate("clf").unwrap();

        let proba = model.predict_proba(&[3.0]);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(proba[2] > proba[1] && proba[1] > proba[0]);
    }

    #[test]
    fn test_logistic_row_count_validated() {
        let model = LogisticClassifier {
            feature_names: None,
            classes: vec!["Low".into(), "Medium".into(), "High".into()],
            coefficients: vec![vec![1.0], vec![1.0]],
            intercepts: vec![0.0, 0.0],
        };
        assert!(model.validate("clf").is_err());
    }
}
