//! Ordered feature list the models were trained on

use crate::error::ContractError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The trained feature contract: model input names in fitted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContract {
    pub features: Vec<String>,
    /// Name of the predicted column, for display
    #[serde(default)]
    pub target: Option<String>,
}

impl FeatureContract {
    pub fn new(features: Vec<String>) -> Result<Self, ContractError> {
        let contract = Self {
            features,
            target: None,
        };
        contract.validate()?;
        Ok(contract)
    }

    pub fn from_json(json: &str) -> Result<Self, ContractError> {
        let contract: Self = serde_json::from_str(json)
            .map_err(|e| ContractError::invalid_artifact("contract", e.to_string()))?;
        contract.validate()?;
        Ok(contract)
    }

    pub fn validate(&self) -> Result<(), ContractError> {
        if self.features.is_empty() {
            return Err(ContractError::invalid_artifact("contract", "no features"));
        }
        let mut seen = HashSet::new();
        for name in &self.features {
            if !seen.insert(name.as_str()) {
                return Err(ContractError::invalid_artifact(
                    "contract",
                    format!("feature '{}' listed twice", name),
                ));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Check names declared by a model artifact against the contract
    pub fn check_model_features(
        &self,
        model: &str,
        n_features: usize,
        feature_names: Option<&[String]>,
    ) -> Result<(), ContractError> {
        if n_features != self.len() {
            return Err(ContractError::FeatureCountMismatch {
                stage: format!("model '{}'", model),
                expected: n_features,
                actual: self.len(),
            });
        }

        if let Some(names) = feature_names {
            if let Some((i, (declared, expected))) = names
                .iter()
                .zip(self.features.iter())
                .enumerate()
                .find(|(_, (a, b))| a != b)
            {
                return Err(ContractError::invalid_artifact(
                    model,
                    format!(
                        "feature {} is '{}' but the contract expects '{}'",
                        i, declared, expected
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract() -> FeatureContract {
        FeatureContract::new(vec!["Year".into(), "Country_France".into()]).unwrap()
    }

    #[test]
    fn test_duplicate_feature_rejected() {
        let err = FeatureContract::new(vec!["Year".into(), "Year".into()]).unwrap_err();
        assert_eq!(err.kind(), "invalid_artifact");
    }

    #[test]
    fn test_model_feature_count_checked() {
        let err = contract().check_model_features("lasso", 3, None).unwrap_err();
        assert_eq!(err.kind(), "feature_count_mismatch");
    }

    #[test]
    fn test_model_feature_order_checked() {
        let swapped = vec!["Country_France".to_string(), "Year".to_string()];
        let err = contract()
            .check_model_features("lasso", 2, Some(&swapped))
            .unwrap_err();
        assert!(err.to_string().contains("feature 0 is 'Country_France'"));

        let same = contract().features.clone();
        assert!(contract().check_model_features("lasso", 2, Some(&same)).is_ok());
    }
}
