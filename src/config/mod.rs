//! Configuration module for Stockcast.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by concern: Model artifacts, Forecast pipeline, and Market data.

mod data_config;
mod forecast_config;
mod model_config;

pub use data_config::{DataEnvConfig, DataSource};
pub use forecast_config::ForecastEnvConfig;
pub use model_config::{ModelEnvConfig, ScalerMode};

use anyhow::{Context, Result};

/// Main application configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub model: ModelEnvConfig,
    pub forecast: ForecastEnvConfig,
    pub data: DataEnvConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This orchestrates loading from all sub-config modules and composes
    /// them into a unified Config struct.
    pub fn from_env() -> Result<Self> {
        let model = ModelEnvConfig::from_env().context("Failed to load model config")?;
        let forecast = ForecastEnvConfig::from_env().context("Failed to load forecast config")?;
        let data = DataEnvConfig::from_env().context("Failed to load data config")?;

        Ok(Self {
            model,
            forecast,
            data,
        })
    }
}
