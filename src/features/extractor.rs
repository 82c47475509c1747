//! Feature reconciliation for model inference.
//!
//! Turns a submitted record into the exact vector the trained models expect:
//! categorical columns go through their fitted encoders, numeric columns
//! through the fitted scaler, and the result is laid out in contract order.
//! Any disagreement between the input, the encoders, the scaler and the
//! contract is reported instead of producing a vector.

use crate::config::UnknownCategoryPolicy;
use crate::error::ContractError;
use crate::features::contract::FeatureContract;
use crate::features::encoder::EncoderSet;
use crate::features::scaler::Scaler;
use crate::types::record::{RawColumn, RawValue, WasteRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Model input in contract order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub names: Vec<String>,
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }
}

/// Reconciles raw input columns with the fitted pipeline.
pub struct FeatureExtractor {
    contract: FeatureContract,
    encoders: EncoderSet,
    scaler: Scaler,
    policy: UnknownCategoryPolicy,
}

impl FeatureExtractor {
    /// Create an extractor, failing when the artifacts disagree with each other.
    pub fn new(
        contract: FeatureContract,
        encoders: EncoderSet,
        scaler: Scaler,
        policy: UnknownCategoryPolicy,
    ) -> Result<Self, ContractError> {
        let extractor = Self {
            contract,
            encoders,
            scaler,
            policy,
        };
        extractor.check_compatibility()?;
        Ok(extractor)
    }

    /// Every column the encoders and the scaler produce must have a place in the contract.
    pub fn check_compatibility(&self) -> Result<(), ContractError> {
        for name in self.scaler.feature_names() {
            if !self.contract.contains(name) {
                return Err(ContractError::UnexpectedColumn(name.clone()));
            }
            if self.encoders.get(name).is_some() {
                return Err(ContractError::invalid_artifact(
                    "scaler",
                    format!("'{}' is both scaled and categorically encoded", name),
                ));
            }
        }

        for (column, encoder) in self.encoders.iter() {
            for output in encoder.output_columns(column) {
                if !self.contract.contains(&output) {
                    return Err(ContractError::UnexpectedColumn(output));
                }
            }
        }

        Ok(())
    }

    /// Extract the model input vector from a record
    pub fn extract(&self, record: &WasteRecord) -> Result<FeatureVector, ContractError> {
        let features = self.extract_columns(&record.columns())?;
        debug!(
            record_id = %record.record_id,
            features = features.len(),
            "Features extracted"
        );
        Ok(features)
    }

    /// Extract the model input vector from arbitrary named columns
    pub fn extract_columns(&self, columns: &[RawColumn]) -> Result<FeatureVector, ContractError> {
        let mut produced: BTreeMap<String, f64> = BTreeMap::new();

        for column in columns {
            for (name, value) in self.encode_column(column)? {
                if produced.insert(name.clone(), value).is_some() {
                    return Err(ContractError::DuplicateColumn(name));
                }
            }
        }

        // Scaling
        let raw = self
            .scaler
            .feature_names()
            .iter()
            .map(|name| {
                produced
                    .get(name)
                    .copied()
                    .ok_or_else(|| ContractError::MissingColumn {
                        stage: "scaler".to_string(),
                        column: name.clone(),
                    })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let scaled = self.scaler.transform(&raw)?;
        for (name, value) in self.scaler.feature_names().iter().zip(scaled) {
            produced.insert(name.clone(), value);
        }

        // Contract order
        let mut values = Vec::with_capacity(self.contract.len());
        for name in &self.contract.features {
            let value = produced
                .remove(name)
                .ok_or_else(|| ContractError::MissingColumn {
                    stage: "model".to_string(),
                    column: name.clone(),
                })?;
            values.push(value);
        }

        if let Some(extra) = produced.into_keys().next() {
            return Err(ContractError::UnexpectedColumn(extra));
        }

        Ok(FeatureVector {
            names: self.contract.features.clone(),
            values,
        })
    }

    fn encode_column(&self, column: &RawColumn) -> Result<Vec<(String, f64)>, ContractError> {
        match (&column.value, self.encoders.get(&column.name)) {
            (RawValue::Text(value), Some(encoder)) => {
                encoder.encode(&column.name, value, self.policy)
            }
            (RawValue::Text(_), None) => Err(ContractError::MissingEncoder(column.name.clone())),
            (RawValue::Number(value), Some(_)) => Err(ContractError::InvalidValue {
                field: column.name.clone(),
                expected: "a category".to_string(),
                value: value.to_string(),
            }),
            (RawValue::Number(value), None) if !value.is_finite() => {
                Err(ContractError::NonFiniteValue(column.name.clone()))
            }
            (RawValue::Number(value), None) => Ok(vec![(column.name.clone(), *value)]),
        }
    }

    /// Number of features produced
    pub fn feature_count(&self) -> usize {
        self.contract.len()
    }

    /// Feature names in contract order
    pub fn feature_names(&self) -> &[String] {
        &self.contract.features
    }

    pub fn contract(&self) -> &FeatureContract {
        &self.contract
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    pub fn encoders(&self) -> &EncoderSet {
        &self.encoders
    }

    pub fn policy(&self) -> UnknownCategoryPolicy {
        self.policy
    }
}
