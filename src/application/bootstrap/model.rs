use anyhow::Result;
use std::sync::Arc;

use crate::application::ml::predictor::SequencePredictor;
use crate::config::Config;
use crate::infrastructure::model_manifest::ModelManifest;

pub struct ModelBootstrap;

impl ModelBootstrap {
    /// Loads the predictor once at startup.
    ///
    /// A missing or unloadable artifact leaves the service without a model
    /// (forecasts answer `ModelUnavailable`); a manifest that contradicts the
    /// configured input contract is an error.
    pub fn init(config: &Config) -> Result<Option<Arc<dyn SequencePredictor>>> {
        let model_path = &config.model.model_path;

        let manifest = ModelManifest::load_for(model_path)?;
        if let Some(manifest) = &manifest {
            manifest.verify(config.forecast.window_size, &config.forecast.features)?;
        }

        Self::load(config, manifest.as_ref())
    }

    #[cfg(feature = "onnx")]
    fn load(
        config: &Config,
        manifest: Option<&ModelManifest>,
    ) -> Result<Option<Arc<dyn SequencePredictor>>> {
        use crate::application::ml::onnx_predictor::OnnxPredictor;
        use tracing::{error, info};

        match OnnxPredictor::load(&config.model.model_path) {
            Ok(predictor) => {
                let predictor = match manifest {
                    Some(manifest) => predictor.with_manifest(manifest),
                    None => predictor,
                };
                info!(
                    "Model ready: {} {} (window {}, features {})",
                    predictor.name(),
                    predictor.version(),
                    config.forecast.window_size,
                    config.forecast.features
                );
                Ok(Some(Arc::new(predictor)))
            }
            Err(e) => {
                error!("{}. Forecasting is disabled until a model is provided.", e);
                Ok(None)
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    fn load(
        config: &Config,
        _manifest: Option<&ModelManifest>,
    ) -> Result<Option<Arc<dyn SequencePredictor>>> {
        tracing::warn!(
            "Built without the 'onnx' feature; ignoring model at {:?}. Forecasting is disabled.",
            config.model.model_path
        );
        Ok(None)
    }
}
