//! ONNX Runtime backend for exported models

use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::{Mutex, Once};
use tracing::info;

static ORT_INIT: Once = Once::new();

/// ONNX session with its resolved input/output names
pub struct OnnxModel {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    /// Feature count from the input shape, when it is static
    n_features: Option<usize>,
}

impl OnnxModel {
    /// Load a model and resolve its input and output names
    pub fn load(path: &Path, name: &str, threads: usize) -> Result<Self> {
        ORT_INIT.call_once(|| {
            if let Err(e) = ort::init().commit() {
                tracing::warn!(error = %e, "ONNX Runtime environment init failed");
            } else {
                info!(onnx_threads = threads, "ONNX Runtime initialized");
            }
        });

        info!(model = %name, path = %path.display(), threads = threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let n_features = session
            .inputs
            .first()
            .and_then(|i| i.input_type.tensor_shape())
            .and_then(|shape| shape.last().copied())
            .filter(|&dim| dim > 0)
            .map(|dim| dim as usize);

        // Classifiers export a label output followed by probabilities
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob") || o.name.contains("variable"))
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "variable".to_string());

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            n_features = ?n_features,
            "Model loaded successfully"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            n_features,
        })
    }

    pub fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    /// Run the model on one row and return the flattened output tensor
    pub fn run(&self, features: &[f64]) -> Result<Vec<f64>> {
        let data: Vec<f32> = features.iter().map(|&v| v as f32).collect();
        let shape = vec![1_i64, data.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, data)).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| anyhow::anyhow!("Output '{}' not produced", self.output_name))?;

        let (_, data) = output
            .try_extract_tensor::<f32>()
            .context("Output is not an f32 tensor")?;

        Ok(data.iter().map(|&v| v as f64).collect())
    }
}
