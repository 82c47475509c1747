//! Fitted categorical encoders.
//!
//! Encoders are lookup tables fixed at training time. A label encoder maps a
//! category to its index in `classes`; a one-hot encoder expands a category
//! into one indicator column per known category, named `<Column>_<Category>`.

use crate::config::UnknownCategoryPolicy;
use crate::error::ContractError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Code emitted by a label encoder for an unseen category under the sentinel policy
pub const LABEL_SENTINEL: f64 = -1.0;

/// A fitted encoder for one categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoricalEncoder {
    /// Integer code per class, in fitted order
    Label { classes: Vec<String> },
    /// One indicator column per category, in fitted order
    OneHot { categories: Vec<String> },
}

impl CategoricalEncoder {
    /// Known categories in fitted order
    pub fn categories(&self) -> &[String] {
        match self {
            CategoricalEncoder::Label { classes } => classes,
            CategoricalEncoder::OneHot { categories } => categories,
        }
    }

    /// Names of the columns this encoder produces for `column`
    pub fn output_columns(&self, column: &str) -> Vec<String> {
        match self {
            CategoricalEncoder::Label { .. } => vec![column.to_string()],
            CategoricalEncoder::OneHot { categories } => categories
                .iter()
                .map(|category| one_hot_column(column, category))
                .collect(),
        }
    }

    /// Encode one value of `column` into named numeric columns.
    pub fn encode(
        &self,
        column: &str,
        value: &str,
        policy: UnknownCategoryPolicy,
    ) -> Result<Vec<(String, f64)>, ContractError> {
        let position = self.categories().iter().position(|c| c == value);

        if position.is_none() {
            match policy {
                UnknownCategoryPolicy::Error => {
                    return Err(ContractError::UnknownCategory {
                        column: column.to_string(),
                        value: value.to_string(),
                        known: self.categories().join(", "),
                    });
                }
                UnknownCategoryPolicy::Sentinel => {
                    warn!(
                        column = %column,
                        value = %value,
                        "Unknown category mapped to sentinel encoding"
                    );
                }
            }
        }

        let encoded = match self {
            CategoricalEncoder::Label { .. } => {
                let code = position.map(|p| p as f64).unwrap_or(LABEL_SENTINEL);
                vec![(column.to_string(), code)]
            }
            CategoricalEncoder::OneHot { categories } => categories
                .iter()
                .enumerate()
                .map(|(i, category)| {
                    let hot = if Some(i) == position { 1.0 } else { 0.0 };
                    (one_hot_column(column, category), hot)
                })
                .collect(),
        };

        Ok(encoded)
    }

    /// Check the fitted table is usable
    pub fn validate(&self, column: &str) -> Result<(), ContractError> {
        let categories = self.categories();
        if categories.is_empty() {
            return Err(ContractError::invalid_artifact(
                "encoders",
                format!("encoder for '{}' has no categories", column),
            ));
        }

        let mut seen = HashSet::new();
        for category in categories {
            if !seen.insert(category.as_str()) {
                return Err(ContractError::invalid_artifact(
                    "encoders",
                    format!("encoder for '{}' lists '{}' twice", column, category),
                ));
            }
        }
        Ok(())
    }
}

fn one_hot_column(column: &str, category: &str) -> String {
    format!("{}_{}", column, category)
}

/// Encoders keyed by the column they were fitted on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncoderSet {
    encoders: BTreeMap<String, CategoricalEncoder>,
}

impl EncoderSet {
    pub fn new(encoders: BTreeMap<String, CategoricalEncoder>) -> Result<Self, ContractError> {
        let set = Self { encoders };
        set.validate()?;
        Ok(set)
    }

    pub fn from_json(json: &str) -> Result<Self, ContractError> {
        let set: Self = serde_json::from_str(json)
            .map_err(|e| ContractError::invalid_artifact("encoders", e.to_string()))?;
        set.validate()?;
        Ok(set)
    }

    pub fn validate(&self) -> Result<(), ContractError> {
        for (column, encoder) in &self.encoders {
            encoder.validate(column)?;
        }
        Ok(())
    }

    pub fn get(&self, column: &str) -> Option<&CategoricalEncoder> {
        self.encoders.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.encoders.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CategoricalEncoder)> {
        self.encoders.iter()
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }
}
