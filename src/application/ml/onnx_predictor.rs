use super::predictor::SequencePredictor;
use crate::domain::errors::PredictorError;
use crate::infrastructure::model_manifest::ModelManifest;
use ndarray::{Array2, ArrayView3};
use ort::session::Session;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Sequence predictor backed by an ONNX Runtime session.
///
/// Expects a single `[batch, window, features]` float input and a single
/// `[batch, features]` float output.
pub struct OnnxPredictor {
    session: Mutex<Session>,
    version: String,
    parameter_count: Option<u64>,
}

impl OnnxPredictor {
    pub fn load(model_path: &Path) -> Result<Self, PredictorError> {
        let load_error = |reason: String| PredictorError::Load {
            path: model_path.display().to_string(),
            reason,
        };

        if !model_path.exists() {
            return Err(load_error("file not found".to_string()));
        }

        let session = Session::builder()
            .map_err(|e| load_error(format!("session builder: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| load_error(e.to_string()))?;

        info!("Successfully loaded ONNX model from {:?}", model_path);
        Ok(Self {
            session: Mutex::new(session),
            version: "unversioned".to_string(),
            parameter_count: None,
        })
    }

    /// Takes version and parameter count from the artifact's manifest.
    pub fn with_manifest(mut self, manifest: &ModelManifest) -> Self {
        if let Some(version) = &manifest.version {
            self.version = version.clone();
        }
        self.parameter_count = manifest.parameter_count;
        self
    }
}

impl SequencePredictor for OnnxPredictor {
    fn predict(&self, input: ArrayView3<f64>) -> Result<Array2<f64>, PredictorError> {
        let (batch, window, features) = input.dim();
        let flat_data: Vec<f32> = input.iter().map(|v| *v as f32).collect();
        let shape = vec![batch, window, features];

        let input_value = ort::value::Value::from_array((shape.as_slice(), flat_data)).map_err(
            |e| PredictorError::Inference {
                reason: format!("input tensor creation failed: {}", e),
            },
        )?;

        let mut session = self.session.lock().map_err(|e| PredictorError::Inference {
            reason: format!("session lock poisoned: {}", e),
        })?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| PredictorError::Inference {
                reason: e.to_string(),
            })?;

        let output_value = outputs
            .iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| PredictorError::Inference {
                reason: "model produced no output".to_string(),
            })?;
        let (out_shape, data) =
            output_value
                .try_extract_tensor::<f32>()
                .map_err(|e| PredictorError::Inference {
                    reason: e.to_string(),
                })?;

        let dims: Vec<usize> = out_shape.iter().map(|d| *d as usize).collect();
        if dims.len() != 2 {
            return Err(PredictorError::Shape {
                expected: format!("[{}, {}]", batch, features),
                actual: format!("{:?}", dims),
            });
        }

        let values: Vec<f64> = data.iter().map(|v| *v as f64).collect();
        Array2::from_shape_vec((dims[0], dims[1]), values).map_err(|e| PredictorError::Shape {
            expected: format!("{:?}", dims),
            actual: e.to_string(),
        })
    }

    fn name(&self) -> &str {
        "ONNX Runtime (LSTM)"
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn parameter_count(&self) -> Option<u64> {
        self.parameter_count
    }
}
