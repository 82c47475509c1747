//! HTML rendering of the estimation page

use crate::error::EstimateError;
use crate::form::{keys, FieldSpec, FormSchema};
use crate::types::estimate::{DisplayFormat, Estimate};
use crate::types::record::WasteRecord;
use minijinja::{context, Environment};
use serde::Serialize;
use std::collections::HashMap;

const INDEX_TEMPLATE: &str = "index.html";

/// Renders pages from the embedded templates
pub struct PageRenderer {
    env: Environment<'static>,
}

impl PageRenderer {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template(INDEX_TEMPLATE, include_str!("../templates/index.html"))?;
        Ok(Self { env })
    }

    pub fn render(&self, page: &PageView) -> Result<String, minijinja::Error> {
        self.env
            .get_template(INDEX_TEMPLATE)?
            .render(context!(page => page))
    }
}

/// A form field with its current value
#[derive(Debug, Serialize)]
pub struct FieldView {
    #[serde(flatten)]
    pub spec: FieldSpec,
    pub value: String,
    pub invalid: bool,
}

/// One entry of the entered-parameters table
#[derive(Debug, Serialize)]
pub struct InputRow {
    pub column: &'static str,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct ModelLine {
    pub name: String,
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct ResultView {
    pub amount: String,
    pub loss_level: &'static str,
    pub waste_category: Option<String>,
    pub confidence: Option<String>,
    pub models: Vec<ModelLine>,
    /// Which model produced the figure
    pub source: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorView {
    pub message: String,
    pub field: Option<String>,
}

/// Everything the page template shows
#[derive(Debug, Serialize)]
pub struct PageView {
    pub fields: Vec<FieldView>,
    pub inputs: Vec<InputRow>,
    pub unit: String,
    pub result: Option<ResultView>,
    pub error: Option<ErrorView>,
}

impl PageView {
    /// Page showing `values` (form key → submitted text) in the form
    pub fn new(schema: &FormSchema, values: &HashMap<String, String>, display: &DisplayFormat) -> Self {
        let fields: Vec<FieldView> = schema
            .fields()
            .into_iter()
            .map(|spec| FieldView {
                value: values
                    .get(spec.key)
                    .cloned()
                    .unwrap_or_else(|| spec.default.clone()),
                spec,
                invalid: false,
            })
            .collect();

        let inputs = fields
            .iter()
            .map(|f| InputRow {
                column: f.spec.column,
                value: f.value.clone(),
            })
            .collect();

        Self {
            fields,
            inputs,
            unit: format!("{} {}", display.currency_symbol, display.unit),
            result: None,
            error: None,
        }
    }

    /// Page pre-filled with a record's values
    pub fn for_record(schema: &FormSchema, record: &WasteRecord, display: &DisplayFormat) -> Self {
        Self::new(schema, &record_values(record), display)
    }

    pub fn with_estimate(mut self, estimate: &Estimate, display: &DisplayFormat) -> Self {
        self.result = Some(ResultView {
            amount: display.amount(estimate.economic_loss_million),
            loss_level: estimate.loss_level.as_str(),
            waste_category: estimate.waste_category.as_ref().map(|c| c.label.clone()),
            confidence: estimate
                .waste_category
                .as_ref()
                .map(|c| format!("{:.0}%", c.confidence * 100.0)),
            models: estimate
                .model_estimates
                .iter()
                .map(|(name, value)| ModelLine {
                    name: name.clone(),
                    amount: display.amount(*value),
                })
                .collect(),
            source: model_source(estimate),
        });
        self
    }

    /// Show an inline error and mark the offending field
    pub fn with_error(mut self, error: &EstimateError) -> Self {
        let field = error.field().map(str::to_string);
        for view in &mut self.fields {
            view.invalid = field.as_deref() == Some(view.spec.column);
        }
        self.error = Some(ErrorView {
            message: error.to_string(),
            field,
        });
        self
    }
}

fn model_source(estimate: &Estimate) -> String {
    let names: Vec<&str> = estimate.model_estimates.keys().map(String::as_str).collect();
    match names.as_slice() {
        [name] => format!("the {} model", name),
        _ => format!("an ensemble of {} models ({})", names.len(), names.join(", ")),
    }
}

/// Form values of a record, keyed by form field key
pub fn record_values(record: &WasteRecord) -> HashMap<String, String> {
    [
        (keys::COUNTRY, record.country.clone()),
        (keys::YEAR, record.year.to_string()),
        (keys::FOOD_CATEGORY, record.food_category.clone()),
        (keys::TOTAL_WASTE, record.total_waste_tons.to_string()),
        (keys::AVG_WASTE_PER_CAPITA, record.avg_waste_per_capita_kg.to_string()),
        (keys::POPULATION, record.population_million.to_string()),
        (keys::HOUSEHOLD_WASTE, record.household_waste_pct.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}
