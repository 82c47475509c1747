//! Form schema: the input fields offered to the user, their options, ranges
//! and defaults, and parsing of submitted values into a [`WasteRecord`].

use crate::config::{FormConfig, NumericField};
use crate::error::ContractError;
use crate::features::FeatureExtractor;
use crate::types::record::{columns, WasteRecord};
use serde::Serialize;
use std::collections::HashMap;

/// Input widget kind of a form field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum FieldKind {
    Select { options: Vec<String> },
    Integer { min: i32, max: i32 },
    Number { min: f64, max: Option<f64>, step: f64 },
}

/// One field of the form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    /// HTML form key
    pub key: &'static str,
    /// Dataset column the field feeds
    pub column: &'static str,
    /// Label shown to the user
    pub label: &'static str,
    #[serde(flatten)]
    pub kind: FieldKind,
    /// Pre-filled value
    pub default: String,
}

/// Form field keys
pub mod keys {
    pub const COUNTRY: &str = "country";
    pub const YEAR: &str = "year";
    pub const FOOD_CATEGORY: &str = "food_category";
    pub const TOTAL_WASTE: &str = "total_waste_tons";
    pub const AVG_WASTE_PER_CAPITA: &str = "avg_waste_per_capita_kg";
    pub const POPULATION: &str = "population_million";
    pub const HOUSEHOLD_WASTE: &str = "household_waste_pct";
}

/// Validated form definition
#[derive(Debug, Clone)]
pub struct FormSchema {
    config: FormConfig,
}

impl FormSchema {
    pub fn new(config: FormConfig) -> Result<Self, ContractError> {
        let schema = Self { config };
        schema.check()?;
        Ok(schema)
    }

    fn check(&self) -> Result<(), ContractError> {
        let c = &self.config;
        if c.countries.is_empty() || c.food_categories.is_empty() {
            return Err(ContractError::invalid_artifact("form", "empty option list"));
        }
        if !(c.year_min <= c.year_default && c.year_default <= c.year_max) {
            return Err(ContractError::invalid_artifact(
                "form",
                "year default outside the year range",
            ));
        }
        for (column, field) in self.numeric_fields() {
            check_range(column, field, field.default).map_err(|_| {
                ContractError::invalid_artifact(
                    "form",
                    format!("default for '{}' outside its range", column),
                )
            })?;
        }
        Ok(())
    }

    /// Every option the form offers must be known to the fitted encoders, and
    /// every numeric field must reach the scaler or the contract.
    pub fn check_extractor(&self, extractor: &FeatureExtractor) -> Result<(), ContractError> {
        let c = &self.config;
        for (column, options) in [
            (columns::COUNTRY, &c.countries),
            (columns::FOOD_CATEGORY, &c.food_categories),
        ] {
            let encoder = extractor
                .encoders()
                .get(column)
                .ok_or_else(|| ContractError::MissingEncoder(column.to_string()))?;
            if let Some(option) = options
                .iter()
                .find(|o| !encoder.categories().contains(*o))
            {
                return Err(ContractError::invalid_artifact(
                    "form",
                    format!(
                        "option '{}' for '{}' is unknown to the fitted encoder",
                        option, column
                    ),
                ));
            }
        }

        let numeric = std::iter::once(columns::YEAR)
            .chain(self.numeric_fields().into_iter().map(|(column, _)| column));
        for column in numeric {
            let scaled = extractor.scaler().feature_names().iter().any(|n| n == column);
            if !scaled && !extractor.contract().contains(column) {
                return Err(ContractError::invalid_artifact(
                    "form",
                    format!("field '{}' feeds no scaler input or contract column", column),
                ));
            }
        }
        Ok(())
    }

    fn numeric_fields(&self) -> [(&'static str, &NumericField); 4] {
        [
            (columns::TOTAL_WASTE, &self.config.total_waste_tons),
            (columns::AVG_WASTE_PER_CAPITA, &self.config.avg_waste_per_capita_kg),
            (columns::POPULATION, &self.config.population_million),
            (columns::HOUSEHOLD_WASTE, &self.config.household_waste_pct),
        ]
    }

    /// Fields in display order
    pub fn fields(&self) -> Vec<FieldSpec> {
        let c = &self.config;
        let number = |key, column, label, field: &NumericField, step| FieldSpec {
            key,
            column,
            label,
            kind: FieldKind::Number {
                min: field.min,
                max: field.max,
                step,
            },
            default: field.default.to_string(),
        };

        vec![
            FieldSpec {
                key: keys::COUNTRY,
                column: columns::COUNTRY,
                label: "Country",
                kind: FieldKind::Select {
                    options: c.countries.clone(),
                },
                default: c.countries[0].clone(),
            },
            FieldSpec {
                key: keys::YEAR,
                column: columns::YEAR,
                label: "Year",
                kind: FieldKind::Integer {
                    min: c.year_min,
                    max: c.year_max,
                },
                default: c.year_default.to_string(),
            },
            FieldSpec {
                key: keys::FOOD_CATEGORY,
                column: columns::FOOD_CATEGORY,
                label: "Food category",
                kind: FieldKind::Select {
                    options: c.food_categories.clone(),
                },
                default: c.food_categories[0].clone(),
            },
            number(
                keys::TOTAL_WASTE,
                columns::TOTAL_WASTE,
                "Total waste (tons)",
                &c.total_waste_tons,
                1.0,
            ),
            number(
                keys::AVG_WASTE_PER_CAPITA,
                columns::AVG_WASTE_PER_CAPITA,
                "Average waste per capita (kg)",
                &c.avg_waste_per_capita_kg,
                0.1,
            ),
            number(
                keys::POPULATION,
                columns::POPULATION,
                "Population (millions)",
                &c.population_million,
                0.1,
            ),
            number(
                keys::HOUSEHOLD_WASTE,
                columns::HOUSEHOLD_WASTE,
                "Household waste (%)",
                &c.household_waste_pct,
                0.5,
            ),
        ]
    }

    /// The record the form starts with
    pub fn default_record(&self) -> WasteRecord {
        let c = &self.config;
        WasteRecord::new(
            &c.countries[0],
            c.year_default,
            &c.food_categories[0],
            c.total_waste_tons.default,
            c.avg_waste_per_capita_kg.default,
            c.population_million.default,
            c.household_waste_pct.default,
        )
    }

    /// Parse submitted form values and validate them
    pub fn parse(&self, form: &HashMap<String, String>) -> Result<WasteRecord, ContractError> {
        let text = |key: &str, column: &str| -> Result<String, ContractError> {
            form.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ContractError::MissingField(column.to_string()))
        };
        let number = |key: &str, column: &str| -> Result<f64, ContractError> {
            let raw = text(key, column)?;
            let value: f64 = raw.parse().map_err(|_| ContractError::InvalidValue {
                field: column.to_string(),
                expected: "a number".to_string(),
                value: raw.clone(),
            })?;
            if !value.is_finite() {
                return Err(ContractError::NonFiniteValue(column.to_string()));
            }
            Ok(value)
        };

        let year_raw = text(keys::YEAR, columns::YEAR)?;
        let year: i32 = year_raw.parse().map_err(|_| ContractError::InvalidValue {
            field: columns::YEAR.to_string(),
            expected: "a whole number".to_string(),
            value: year_raw.clone(),
        })?;

        let record = WasteRecord::new(
            &text(keys::COUNTRY, columns::COUNTRY)?,
            year,
            &text(keys::FOOD_CATEGORY, columns::FOOD_CATEGORY)?,
            number(keys::TOTAL_WASTE, columns::TOTAL_WASTE)?,
            number(keys::AVG_WASTE_PER_CAPITA, columns::AVG_WASTE_PER_CAPITA)?,
            number(keys::POPULATION, columns::POPULATION)?,
            number(keys::HOUSEHOLD_WASTE, columns::HOUSEHOLD_WASTE)?,
        );

        self.validate(&record)?;
        Ok(record)
    }

    /// Check a record against the form's options and ranges
    pub fn validate(&self, record: &WasteRecord) -> Result<(), ContractError> {
        let c = &self.config;

        check_option(columns::COUNTRY, &record.country, &c.countries)?;
        check_option(columns::FOOD_CATEGORY, &record.food_category, &c.food_categories)?;

        if record.year < c.year_min || record.year > c.year_max {
            return Err(ContractError::OutOfRange {
                field: columns::YEAR.to_string(),
                min: c.year_min as f64,
                max: c.year_max as f64,
                value: record.year as f64,
            });
        }

        let values = [
            record.total_waste_tons,
            record.avg_waste_per_capita_kg,
            record.population_million,
            record.household_waste_pct,
        ];
        for ((column, field), value) in self.numeric_fields().into_iter().zip(values) {
            check_range(column, field, value)?;
        }

        Ok(())
    }
}

fn check_option(column: &str, value: &str, options: &[String]) -> Result<(), ContractError> {
    if options.iter().any(|o| o == value) {
        Ok(())
    } else {
        Err(ContractError::UnknownCategory {
            column: column.to_string(),
            value: value.to_string(),
            known: options.join(", "),
        })
    }
}

fn check_range(column: &str, field: &NumericField, value: f64) -> Result<(), ContractError> {
    if !value.is_finite() {
        return Err(ContractError::NonFiniteValue(column.to_string()));
    }
    let max = field.max.unwrap_or(f64::INFINITY);
    if value < field.min || value > max {
        return Err(ContractError::OutOfRange {
            field: column.to_string(),
            min: field.min,
            max,
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnknownCategoryPolicy;
    use crate::features::{FeatureContract, Scaler};
    use crate::testing;

    fn schema() -> FormSchema {
        FormSchema::new(FormConfig::default()).unwrap()
    }

    fn submission() -> HashMap<String, String> {
        [
            ("country", "Japan"),
            ("year", "2024"),
            ("food_category", "Meat & Seafood"),
            ("total_waste_tons", "18500.5"),
            ("avg_waste_per_capita_kg", " 72 "),
            ("population_million", "125.7"),
            ("household_waste_pct", "44"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_form_matches_fitted_encoders() {
        schema().check_extractor(&testing::extractor()).unwrap();
    }

    #[test]
    fn test_form_option_unknown_to_encoder() {
        let mut config = FormConfig::default();
        config.countries.push("Germany".to_string());
        let schema = FormSchema::new(config).unwrap();

        let err = schema.check_extractor(&testing::extractor()).unwrap_err();
        assert_eq!(err.kind(), "invalid_artifact");
        assert!(err.to_string().contains("'Germany'"), "{}", err);
    }

    #[test]
    fn test_form_numeric_field_unknown_to_scaler() {
        let contract: Vec<String> = testing::contract()
            .features
            .into_iter()
            .filter(|n| n != "Household Waste (%)")
            .collect();
        let scaler = Scaler::Standard {
            feature_names: testing::NUMERIC[..4].iter().map(|s| s.to_string()).collect(),
            mean: vec![2021.0, 25_000.0, 110.0, 700.0],
            scale: vec![2.0, 14_000.0, 50.0, 400.0],
        };
        let extractor = FeatureExtractor::new(
            FeatureContract::new(contract).unwrap(),
            testing::encoders(),
            scaler,
            UnknownCategoryPolicy::Error,
        )
        .unwrap();

        let err = schema().check_extractor(&extractor).unwrap_err();
        assert_eq!(err.kind(), "invalid_artifact");
        assert!(err.to_string().contains("'Household Waste (%)'"), "{}", err);
    }

    #[test]
    fn test_parse_valid_submission() {
        let record = schema().parse(&submission()).unwrap();

        assert_eq!(record.country, "Japan");
        assert_eq!(record.year, 2024);
        assert_eq!(record.total_waste_tons, 18500.5);
        assert_eq!(record.avg_waste_per_capita_kg, 72.0);
    }

    #[test]
    fn test_missing_field() {
        let mut form = submission();
        form.remove("population_million");

        let err = schema().parse(&form).unwrap_err();
        assert_eq!(err, ContractError::MissingField("Population (Million)".to_string()));
    }

    #[test]
    fn test_not_a_number() {
        let mut form = submission();
        form.insert("total_waste_tons".to_string(), "lots".to_string());

        let err = schema().parse(&form).unwrap_err();
        assert_eq!(err.kind(), "invalid_value");
        assert_eq!(err.field(), Some("Total Waste (Tons)"));
    }

    #[test]
    fn test_nan_rejected() {
        let mut form = submission();
        form.insert("avg_waste_per_capita_kg".to_string(), "NaN".to_string());

        let err = schema().parse(&form).unwrap_err();
        assert_eq!(err.kind(), "non_finite_value");
    }

    #[test]
    fn test_out_of_range() {
        let mut form = submission();
        form.insert("household_waste_pct".to_string(), "120".to_string());
        let err = schema().parse(&form).unwrap_err();
        assert_eq!(err.field(), Some("Household Waste (%)"));
        assert_eq!(err.kind(), "out_of_range");

        let mut form = submission();
        form.insert("year".to_string(), "2030".to_string());
        assert_eq!(schema().parse(&form).unwrap_err().field(), Some("Year"));

        let mut form = submission();
        form.insert("total_waste_tons".to_string(), "-1".to_string());
        assert_eq!(schema().parse(&form).unwrap_err().kind(), "out_of_range");
    }

    #[test]
    fn test_unknown_option() {
        let mut form = submission();
        form.insert("country".to_string(), "Germany".to_string());

        let err = schema().parse(&form).unwrap_err();
        assert_eq!(err.kind(), "unknown_category");
    }

    #[test]
    fn test_defaults_pass_validation() {
        let schema = schema();
        let record = schema.default_record();

        assert_eq!(record.year, 2022);
        assert_eq!(record.total_waste_tons, 10_000.0);
        assert!(schema.validate(&record).is_ok());
        assert_eq!(schema.fields().len(), 7);
    }

    #[test]
    fn test_inconsistent_form_config_rejected() {
        let mut config = FormConfig::default();
        config.year_default = 2010;
        assert!(FormSchema::new(config).is_err());
    }
}
