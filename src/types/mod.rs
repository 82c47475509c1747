//! Type definitions for records and estimates

pub mod estimate;
pub mod record;

pub use estimate::{CategoryPrediction, DisplayFormat, Estimate, LossLevel, LossLevelThresholds};
pub use record::{RawColumn, RawValue, WasteRecord};
