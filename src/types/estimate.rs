//! Estimation results shown back to the user

use crate::types::record::WasteRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Severity band of an estimated economic loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossLevel {
    Low,
    Moderate,
    High,
    Severe,
}

impl LossLevel {
    /// Determine the band from an estimate in millions and the thresholds
    pub fn from_estimate(loss_million: f64, thresholds: &LossLevelThresholds) -> Self {
        if loss_million >= thresholds.severe {
            LossLevel::Severe
        } else if loss_million >= thresholds.high {
            LossLevel::High
        } else if loss_million >= thresholds.moderate {
            LossLevel::Moderate
        } else {
            LossLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LossLevel::Low => "low",
            LossLevel::Moderate => "moderate",
            LossLevel::High => "high",
            LossLevel::Severe => "severe",
        }
    }
}

/// Lower bounds (in millions) of each loss band
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossLevelThresholds {
    pub moderate: f64,
    pub high: f64,
    pub severe: f64,
}

impl Default for LossLevelThresholds {
    fn default() -> Self {
        Self {
            moderate: 1_000.0,
            high: 10_000.0,
            severe: 50_000.0,
        }
    }
}

/// How monetary amounts are displayed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayFormat {
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default = "default_decimals")]
    pub decimals: usize,
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

fn default_unit() -> String {
    "million".to_string()
}

fn default_decimals() -> usize {
    2
}

impl Default for DisplayFormat {
    fn default() -> Self {
        Self {
            currency_symbol: default_currency_symbol(),
            unit: default_unit(),
            decimals: default_decimals(),
        }
    }
}

impl DisplayFormat {
    /// Format an amount, e.g. `$1234.50 million`
    pub fn amount(&self, value: f64) -> String {
        format!(
            "{}{:.*} {}",
            self.currency_symbol, self.decimals, value, self.unit
        )
    }
}

/// Output of the optional waste-level classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPrediction {
    /// Predicted class label
    pub label: String,
    /// Probability of the predicted class
    pub confidence: f64,
    /// Probability per class label
    pub probabilities: BTreeMap<String, f64>,
}

/// Economic loss estimate for one submitted record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estimate {
    /// Unique estimate identifier
    pub estimate_id: String,

    /// Record this estimate was produced for
    pub record_id: String,

    /// Estimated economic loss in millions
    pub economic_loss_million: f64,

    /// Severity band of the estimate
    pub loss_level: LossLevel,

    /// Individual regressor outputs
    pub model_estimates: BTreeMap<String, f64>,

    /// Waste level from the classifier, when one is configured
    pub waste_category: Option<CategoryPrediction>,

    /// The inputs as submitted
    pub inputs: WasteRecord,

    pub created_at: DateTime<Utc>,
}

impl Estimate {
    pub fn new(
        inputs: WasteRecord,
        economic_loss_million: f64,
        loss_level: LossLevel,
        model_estimates: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            estimate_id: uuid::Uuid::new_v4().to_string(),
            record_id: inputs.record_id.clone(),
            economic_loss_million,
            loss_level,
            model_estimates,
            waste_category: None,
            inputs,
            created_at: Utc::now(),
        }
    }

    /// Attach the classifier output
    pub fn with_waste_category(mut self, category: Option<CategoryPrediction>) -> Self {
        self.waste_category = category;
        self
    }
}
