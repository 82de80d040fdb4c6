//! Persistence for fitted scaling parameters.
//!
//! A scaler fitted once on a training corpus can be stored as JSON and
//! loaded read-only at startup, so every request scales with the same
//! parameters the model was trained with.

use crate::application::ml::scaler::ScalingModel;
use crate::domain::errors::ForecastError;
use crate::domain::ml::feature_registry::FeatureSet;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Serialized scaler with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerArtifact {
    pub id: Uuid,
    pub features: Vec<String>,
    /// Tickers (or other label) the scaler was fitted on.
    pub corpus: String,
    pub fitted_at: DateTime<Utc>,
    pub samples: usize,
    pub data_min: Vec<f64>,
    pub data_max: Vec<f64>,
}

impl ScalerArtifact {
    pub fn from_model(
        model: &ScalingModel,
        features: &FeatureSet,
        corpus: impl Into<String>,
        samples: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            features: features.names(),
            corpus: corpus.into(),
            fitted_at: Utc::now(),
            samples,
            data_min: model.data_min().to_vec(),
            data_max: model.data_max().to_vec(),
        }
    }

    /// Rebuilds the scaler, refusing parameters fitted on other features.
    pub fn to_model(&self, expected: &FeatureSet) -> Result<ScalingModel, ForecastError> {
        let expected_names = expected.names();
        if self.features != expected_names {
            return Err(ForecastError::ScalerMismatch {
                stored: self.features.clone(),
                expected: expected_names,
            });
        }
        ScalingModel::from_params(self.data_min.clone(), self.data_max.clone())
    }
}

/// Reads and writes a single scaler artifact file.
pub struct ScalerStore {
    file_path: PathBuf,
}

impl ScalerStore {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn load(&self) -> Result<ScalerArtifact> {
        let content = fs::read_to_string(&self.file_path)
            .with_context(|| format!("Failed to read scaler file {:?}", self.file_path))?;
        let artifact: ScalerArtifact =
            serde_json::from_str(&content).context("Failed to parse scaler JSON")?;

        info!(
            "Loaded scaler {} ({} samples of {}) from {:?}",
            artifact.id, artifact.samples, artifact.corpus, self.file_path
        );
        Ok(artifact)
    }

    pub fn save(&self, artifact: &ScalerArtifact) -> Result<()> {
        if let Some(parent) = self.file_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).context("Failed to create scaler directory")?;
        }

        let content =
            serde_json::to_string_pretty(artifact).context("Failed to serialize scaler")?;

        // Atomic write: write to temp file then rename
        let temp_path = self.file_path.with_extension("tmp");
        fs::write(&temp_path, content).context("Failed to write temp file")?;
        fs::rename(&temp_path, &self.file_path).context("Failed to rename temp file")?;

        info!("Saved scaler {} to {:?}", artifact.id, self.file_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_store() -> (ScalerStore, PathBuf) {
        let unique_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let temp_dir = std::env::temp_dir().join(format!(
            "stockcast_test_{}_{}_scaler",
            std::process::id(),
            unique_id
        ));
        fs::create_dir_all(&temp_dir).expect("Failed to create test temp dir");
        (ScalerStore::new(temp_dir.join("scaler.json")), temp_dir)
    }

    #[test]
    fn test_save_and_load() {
        let (store, temp_dir) = temp_store();
        let model = ScalingModel::fit(array![[10.0], [20.0], [15.0]].view()).unwrap();
        let artifact = ScalerArtifact::from_model(&model, &FeatureSet::close_only(), "AAPL", 3);

        store.save(&artifact).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, artifact);
        assert!(!store.path().with_extension("tmp").exists());

        let restored = loaded.to_model(&FeatureSet::close_only()).unwrap();
        assert_eq!(restored, model);

        let _ = fs::remove_dir_all(temp_dir);
    }

    #[test]
    fn test_feature_mismatch_is_rejected() {
        let model = ScalingModel::fit(array![[10.0], [20.0]].view()).unwrap();
        let artifact = ScalerArtifact::from_model(&model, &FeatureSet::close_only(), "AAPL", 2);

        let ohlc = FeatureSet::parse("open,high,low,close").unwrap();
        assert!(matches!(
            artifact.to_model(&ohlc),
            Err(ForecastError::ScalerMismatch { .. })
        ));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let store = ScalerStore::new("does/not/exist/scaler.json");
        assert!(store.load().is_err());
    }
}
