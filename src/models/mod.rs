//! Model loading and inference components

pub mod aggregator;
pub mod inference;
pub mod linear;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod tree;

pub use aggregator::EstimateAggregator;
pub use inference::{InferenceEngine, Prediction};
pub use loader::{ArtifactBundle, LoadedModel, ModelArtifact, ModelLoader, ModelTask};
