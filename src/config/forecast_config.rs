//! Forecast pipeline configuration parsing from environment variables.
//!
//! This module handles the model input contract (window, features) and the
//! horizon and uncertainty parameters.

use crate::application::forecasting::confidence::{SigmaPrecedence, z_for_coverage};
use crate::domain::ml::feature_registry::FeatureSet;
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

/// Forecast environment configuration
#[derive(Debug, Clone)]
pub struct ForecastEnvConfig {
    // Model input contract (must match training)
    pub window_size: usize,
    pub features: FeatureSet,

    // Horizon
    pub default_horizon: usize,
    pub max_horizon: usize,

    // Uncertainty
    pub confidence_z: f64,
    pub volatility_safety_margin: f64,
    pub sigma_precedence: SigmaPrecedence,

    // Backtest
    pub min_test_sequences: usize,
    pub default_test_fraction: f64,
}

impl Default for ForecastEnvConfig {
    fn default() -> Self {
        Self {
            window_size: 100,
            features: FeatureSet::close_only(),
            default_horizon: 5,
            max_horizon: 30,
            confidence_z: 1.96,
            volatility_safety_margin: 1.5,
            sigma_precedence: SigmaPrecedence::Backtest,
            min_test_sequences: 10,
            default_test_fraction: 0.2,
        }
    }
}

impl ForecastEnvConfig {
    pub fn from_env() -> Result<Self> {
        let window_size = env::var("WINDOW_SIZE")
            .unwrap_or_else(|_| "100".to_string())
            .parse::<usize>()
            .context("Failed to parse WINDOW_SIZE")?;
        if window_size == 0 {
            anyhow::bail!("WINDOW_SIZE must be at least 1");
        }

        let features_str = env::var("FEATURES").unwrap_or_else(|_| "close".to_string());
        let features = FeatureSet::parse(&features_str)
            .with_context(|| format!("Invalid FEATURES: {}", features_str))?;

        let max_horizon = env::var("MAX_FORECAST_HORIZON")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<usize>()
            .context("Failed to parse MAX_FORECAST_HORIZON")?
            .max(1);
        let default_horizon = env::var("DEFAULT_FORECAST_HORIZON")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<usize>()
            .context("Failed to parse DEFAULT_FORECAST_HORIZON")?
            .clamp(1, max_horizon);

        // An explicit coverage wins over a raw z value
        let confidence_z = match env::var("CONFIDENCE_COVERAGE") {
            Ok(coverage) => {
                let coverage = coverage
                    .parse::<f64>()
                    .context("Failed to parse CONFIDENCE_COVERAGE")?;
                z_for_coverage(coverage)?
            }
            Err(_) => env::var("CONFIDENCE_Z")
                .unwrap_or_else(|_| "1.96".to_string())
                .parse::<f64>()
                .context("Failed to parse CONFIDENCE_Z")?,
        };

        let volatility_safety_margin = env::var("VOLATILITY_SAFETY_MARGIN")
            .unwrap_or_else(|_| "1.5".to_string())
            .parse::<f64>()
            .context("Failed to parse VOLATILITY_SAFETY_MARGIN")?;

        let sigma_precedence = SigmaPrecedence::from_str(
            &env::var("SIGMA_PRECEDENCE").unwrap_or_else(|_| "backtest".to_string()),
        )?;

        let min_test_sequences = env::var("MIN_TEST_SEQUENCES")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<usize>()
            .context("Failed to parse MIN_TEST_SEQUENCES")?;

        let default_test_fraction = env::var("DEFAULT_TEST_FRACTION")
            .unwrap_or_else(|_| "0.2".to_string())
            .parse::<f64>()
            .context("Failed to parse DEFAULT_TEST_FRACTION")?;
        if !(default_test_fraction > 0.0 && default_test_fraction < 1.0) {
            anyhow::bail!(
                "DEFAULT_TEST_FRACTION must be in (0, 1), got {}",
                default_test_fraction
            );
        }

        Ok(Self {
            window_size,
            features,
            default_horizon,
            max_horizon,
            confidence_z,
            volatility_safety_margin,
            sigma_precedence,
            min_test_sequences,
            default_test_fraction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_config_defaults() {
        let config = ForecastEnvConfig::default();
        assert_eq!(config.window_size, 100);
        assert_eq!(config.features, FeatureSet::close_only());
        assert_eq!(config.max_horizon, 30);
        assert_eq!(config.confidence_z, 1.96);
        assert_eq!(config.sigma_precedence, SigmaPrecedence::Backtest);
    }
}
