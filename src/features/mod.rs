//! Feature contract, fitted encoders and scaler, and the reconciliation step

pub mod contract;
pub mod encoder;
pub mod extractor;
pub mod scaler;

pub use contract::FeatureContract;
pub use encoder::{CategoricalEncoder, EncoderSet};
pub use extractor::{FeatureExtractor, FeatureVector};
pub use scaler::Scaler;
