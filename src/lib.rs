//! Food Waste Economic Loss Estimator
//!
//! Turns a food waste record (country, year, food category and waste
//! figures) into an economic loss estimate using pre-fitted encoders, a
//! scaler and regression models, served through an HTML form and a JSON API.

pub mod config;
pub mod error;
pub mod features;
pub mod form;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod server;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::AppConfig;
pub use error::{ContractError, EstimateError};
pub use features::FeatureExtractor;
pub use models::inference::InferenceEngine;
pub use pipeline::Estimator;
pub use types::{estimate::Estimate, record::WasteRecord};
