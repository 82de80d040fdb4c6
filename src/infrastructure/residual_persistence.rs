//! Per-ticker residual std from past backtests, kept on disk so a later
//! process can size its confidence bands from them.

use crate::domain::forecast::BacktestReport;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualRecord {
    pub residual_std: f64,
    pub test_samples: usize,
    pub evaluated_at: DateTime<Utc>,
}

impl ResidualRecord {
    pub fn from_report(report: &BacktestReport) -> Self {
        Self {
            residual_std: report.residual_std(),
            test_samples: report.test_samples,
            evaluated_at: Utc::now(),
        }
    }
}

/// JSON file of `ticker -> ResidualRecord`.
pub struct ResidualStore {
    file_path: PathBuf,
}

impl ResidualStore {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    /// Missing file means no backtest has been recorded yet.
    pub fn load(&self) -> Result<HashMap<String, ResidualRecord>> {
        if !self.file_path.exists() {
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(&self.file_path)
            .with_context(|| format!("Failed to read residuals file {:?}", self.file_path))?;
        let records: HashMap<String, ResidualRecord> =
            serde_json::from_str(&content).context("Failed to parse residuals JSON")?;

        info!(
            "Loaded {} backtest residuals from {:?}",
            records.len(),
            self.file_path
        );
        Ok(records)
    }

    /// Residual std per ticker, dropping anything unusable as a sigma.
    pub fn load_sigmas(&self) -> Result<HashMap<String, f64>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|(_, record)| record.residual_std.is_finite() && record.residual_std >= 0.0)
            .map(|(ticker, record)| (ticker, record.residual_std))
            .collect())
    }

    /// Replaces the entry for `ticker`, keeping every other ticker.
    pub fn record(&self, ticker: &str, record: ResidualRecord) -> Result<()> {
        if !record.residual_std.is_finite() {
            warn!("{}: residual std {} not stored", ticker, record.residual_std);
            return Ok(());
        }

        let mut records = self.load()?;
        records.insert(ticker.to_string(), record);
        self.save(&records)
    }

    fn save(&self, records: &HashMap<String, ResidualRecord>) -> Result<()> {
        if let Some(parent) = self.file_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).context("Failed to create residuals directory")?;
        }

        let content =
            serde_json::to_string_pretty(records).context("Failed to serialize residuals")?;

        let temp_path = self.file_path.with_extension("tmp");
        fs::write(&temp_path, content).context("Failed to write temp file")?;
        fs::rename(&temp_path, &self.file_path).context("Failed to rename temp file")?;

        info!("Saved {} backtest residuals to {:?}", records.len(), self.file_path);
        Ok(())
    }
}
