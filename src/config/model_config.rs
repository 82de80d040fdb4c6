//! Model artifact configuration parsing from environment variables.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How the service obtains its scaling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalerMode {
    /// Fit a fresh scaler on each request's own data.
    FitPerRequest,
    /// Load a persisted scaler once at startup and use it read-only.
    Persisted,
}

impl FromStr for ScalerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fit" => Ok(ScalerMode::FitPerRequest),
            "persisted" => Ok(ScalerMode::Persisted),
            _ => anyhow::bail!("Invalid SCALER_MODE: {}. Must be 'fit' or 'persisted'", s),
        }
    }
}

/// Model environment configuration
#[derive(Debug, Clone)]
pub struct ModelEnvConfig {
    pub model_path: PathBuf,
    pub scaler_path: PathBuf,
    pub scaler_mode: ScalerMode,
    /// Backtest residuals per ticker, written by `evaluate`.
    pub residuals_path: PathBuf,
    pub predictor_timeout: Duration,
}

impl Default for ModelEnvConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/stock_prediction_model.onnx"),
            scaler_path: PathBuf::from("models/scaler.json"),
            scaler_mode: ScalerMode::FitPerRequest,
            residuals_path: PathBuf::from("models/residuals.json"),
            predictor_timeout: Duration::from_millis(5000),
        }
    }
}

impl ModelEnvConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let model_path = env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.model_path);
        let scaler_path = env::var("SCALER_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.scaler_path);
        let residuals_path = env::var("RESIDUALS_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.residuals_path);
        let scaler_mode =
            ScalerMode::from_str(&env::var("SCALER_MODE").unwrap_or_else(|_| "fit".to_string()))?;

        let timeout_ms = env::var("PREDICTOR_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u64>()
            .context("Failed to parse PREDICTOR_TIMEOUT_MS")?;
        if timeout_ms == 0 {
            anyhow::bail!("PREDICTOR_TIMEOUT_MS must be positive");
        }

        Ok(Self {
            model_path,
            scaler_path,
            scaler_mode,
            residuals_path,
            predictor_timeout: Duration::from_millis(timeout_ms),
        })
    }
}
