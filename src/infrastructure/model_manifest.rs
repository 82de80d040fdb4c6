//! Optional sidecar describing a model artifact's input contract.
//!
//! Lives next to the model as `<model file name>.manifest.json`. When present,
//! its window size and feature list must match the runtime configuration.

use crate::domain::ml::feature_registry::FeatureSet;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub window_size: usize,
    pub features: Vec<String>,
    #[serde(default)]
    pub parameter_count: Option<u64>,
    #[serde(default)]
    pub version: Option<String>,
}

impl ModelManifest {
    pub fn path_for(model_path: &Path) -> PathBuf {
        let mut name = model_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".manifest.json");
        model_path.with_file_name(name)
    }

    /// Reads the manifest for `model_path`, if one exists.
    pub fn load_for(model_path: &Path) -> Result<Option<Self>> {
        let path = Self::path_for(model_path);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read model manifest {:?}", path))?;
        let manifest: ModelManifest = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse model manifest {:?}", path))?;

        info!("Loaded model manifest from {:?}", path);
        Ok(Some(manifest))
    }

    /// Fails when the manifest disagrees with the configured input contract.
    pub fn verify(&self, window_size: usize, features: &FeatureSet) -> Result<()> {
        if self.window_size != window_size {
            anyhow::bail!(
                "Model was trained with window size {}, but WINDOW_SIZE is {}",
                self.window_size,
                window_size
            );
        }

        let configured = features.names();
        let trained: Vec<String> = self.features.iter().map(|f| f.to_lowercase()).collect();
        if trained != configured {
            anyhow::bail!(
                "Model was trained on features {:?}, but FEATURES is {:?}",
                self.features,
                configured
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> ModelManifest {
        ModelManifest {
            window_size: 100,
            features: vec!["Close".to_string()],
            parameter_count: Some(30_651),
            version: Some("2024.06".to_string()),
        }
    }

    #[test]
    fn test_manifest_path_sits_next_to_model() {
        let path = ModelManifest::path_for(Path::new("models/lstm.onnx"));
        assert_eq!(path, PathBuf::from("models/lstm.onnx.manifest.json"));
    }

    #[test]
    fn test_verify_accepts_matching_contract() {
        assert!(manifest().verify(100, &FeatureSet::close_only()).is_ok());
    }

    #[test]
    fn test_verify_rejects_mismatch() {
        assert!(manifest().verify(60, &FeatureSet::close_only()).is_err());
        let ohlc = FeatureSet::parse("open,high,low,close").unwrap();
        assert!(manifest().verify(100, &ohlc).is_err());
    }

    #[test]
    fn test_missing_manifest_is_none() {
        let result = ModelManifest::load_for(Path::new("no/such/model.onnx")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_manifest_json_optional_fields() {
        let parsed: ModelManifest =
            serde_json::from_str(r#"{"window_size": 60, "features": ["close"]}"#).unwrap();
        assert_eq!(parsed.window_size, 60);
        assert_eq!(parsed.parameter_count, None);
        assert_eq!(parsed.version, None);
    }
}
