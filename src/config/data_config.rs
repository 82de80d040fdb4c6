//! Market data configuration parsing from environment variables.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Where historical bars come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Csv,
    Mock,
}

impl FromStr for DataSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(DataSource::Csv),
            "mock" => Ok(DataSource::Mock),
            _ => anyhow::bail!("Invalid DATA_SOURCE: {}. Must be 'csv' or 'mock'", s),
        }
    }
}

/// Data environment configuration
#[derive(Debug, Clone)]
pub struct DataEnvConfig {
    pub source: DataSource,
    pub data_dir: PathBuf,
    /// Calendar days fetched beyond the window for a next-day prediction.
    pub next_day_lookback_extra: u32,
    /// Calendar days fetched beyond the window for a multi-day forecast.
    pub multi_day_lookback_extra: u32,
    pub evaluation_lookback_days: u32,
}

impl Default for DataEnvConfig {
    fn default() -> Self {
        Self {
            source: DataSource::Csv,
            data_dir: PathBuf::from("data"),
            next_day_lookback_extra: 60,
            multi_day_lookback_extra: 100,
            evaluation_lookback_days: 730,
        }
    }
}

impl DataEnvConfig {
    pub fn from_env() -> Result<Self> {
        let source =
            DataSource::from_str(&env::var("DATA_SOURCE").unwrap_or_else(|_| "csv".to_string()))?;
        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        Ok(Self {
            source,
            data_dir,
            next_day_lookback_extra: parse_u32("NEXT_DAY_LOOKBACK_EXTRA", 60)?,
            multi_day_lookback_extra: parse_u32("MULTI_DAY_LOOKBACK_EXTRA", 100)?,
            evaluation_lookback_days: parse_u32("EVALUATION_LOOKBACK_DAYS", 730)?,
        })
    }
}

fn parse_u32(key: &str, default: u32) -> Result<u32> {
    match env::var(key) {
        Ok(value) => value
            .parse::<u32>()
            .with_context(|| format!("Failed to parse {}", key)),
        Err(_) => Ok(default),
    }
}
