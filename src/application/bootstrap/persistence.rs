use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::application::ml::scaler::ScalingModel;
use crate::config::{Config, ScalerMode};
use crate::infrastructure::residual_persistence::ResidualStore;
use crate::infrastructure::scaler_persistence::ScalerStore;

pub struct PersistenceBootstrap;

impl PersistenceBootstrap {
    /// Returns the shared scaler in persisted mode, `None` when each request
    /// fits its own.
    pub fn init(config: &Config) -> Result<Option<Arc<ScalingModel>>> {
        match config.model.scaler_mode {
            ScalerMode::FitPerRequest => {
                info!("Scaler mode: fit per request");
                Ok(None)
            }
            ScalerMode::Persisted => {
                let store = ScalerStore::new(&config.model.scaler_path);
                let artifact = store.load()?;
                let scaler = artifact
                    .to_model(&config.forecast.features)
                    .with_context(|| format!("Scaler at {:?} is unusable", store.path()))?;
                info!(
                    "Scaler mode: persisted ({} fitted on {})",
                    artifact.id, artifact.corpus
                );
                Ok(Some(Arc::new(scaler)))
            }
        }
    }

    /// Residual std per ticker recorded by earlier backtests.
    pub fn residuals(config: &Config) -> Result<HashMap<String, f64>> {
        ResidualStore::new(&config.model.residuals_path)
            .load_sigmas()
            .with_context(|| {
                format!(
                    "Backtest residuals at {:?} are unusable",
                    config.model.residuals_path
                )
            })
    }
}
