//! Input record submitted through the estimation form

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dataset column names, in the order the training data lists them
pub mod columns {
    pub const COUNTRY: &str = "Country";
    pub const YEAR: &str = "Year";
    pub const FOOD_CATEGORY: &str = "Food Category";
    pub const TOTAL_WASTE: &str = "Total Waste (Tons)";
    pub const AVG_WASTE_PER_CAPITA: &str = "Avg Waste per Capita (Kg)";
    pub const POPULATION: &str = "Population (Million)";
    pub const HOUSEHOLD_WASTE: &str = "Household Waste (%)";
}

/// Food waste attributes for one country, year and food category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasteRecord {
    /// Record identifier used in logs and results
    #[serde(default = "new_record_id")]
    pub record_id: String,

    #[serde(alias = "Country")]
    pub country: String,

    #[serde(alias = "Year")]
    pub year: i32,

    #[serde(alias = "Food Category")]
    pub food_category: String,

    /// Total waste in tons
    #[serde(alias = "Total Waste (Tons)")]
    pub total_waste_tons: f64,

    /// Average waste per inhabitant in kilograms
    #[serde(alias = "Avg Waste per Capita (Kg)")]
    pub avg_waste_per_capita_kg: f64,

    /// Population in millions
    #[serde(alias = "Population (Million)")]
    pub population_million: f64,

    /// Share of household waste, in percent
    #[serde(alias = "Household Waste (%)")]
    pub household_waste_pct: f64,

    #[serde(default = "Utc::now")]
    pub submitted_at: DateTime<Utc>,
}

fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A raw, not yet encoded input value
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl std::fmt::Display for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawValue::Number(v) => write!(f, "{}", v),
            RawValue::Text(s) => f.write_str(s),
        }
    }
}

/// Named raw column as it enters the encoding stage
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub value: RawValue,
}

impl RawColumn {
    pub fn number(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value: RawValue::Number(value),
        }
    }

    pub fn text(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: RawValue::Text(value.to_string()),
        }
    }
}

impl WasteRecord {
    /// Create a record with a fresh identifier
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        country: &str,
        year: i32,
        food_category: &str,
        total_waste_tons: f64,
        avg_waste_per_capita_kg: f64,
        population_million: f64,
        household_waste_pct: f64,
    ) -> Self {
        Self {
            record_id: new_record_id(),
            country: country.to_string(),
            year,
            food_category: food_category.to_string(),
            total_waste_tons,
            avg_waste_per_capita_kg,
            population_million,
            household_waste_pct,
            submitted_at: Utc::now(),
        }
    }

    /// Raw columns in dataset order
    pub fn columns(&self) -> Vec<RawColumn> {
        vec![
            RawColumn::text(columns::COUNTRY, &self.country),
            RawColumn::number(columns::YEAR, self.year as f64),
            RawColumn::text(columns::FOOD_CATEGORY, &self.food_category),
            RawColumn::number(columns::TOTAL_WASTE, self.total_waste_tons),
            RawColumn::number(columns::AVG_WASTE_PER_CAPITA, self.avg_waste_per_capita_kg),
            RawColumn::number(columns::POPULATION, self.population_million),
            RawColumn::number(columns::HOUSEHOLD_WASTE, self.household_waste_pct),
        ]
    }
}
