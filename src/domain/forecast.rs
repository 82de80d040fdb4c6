//! Forecast output types.
//!
//! Everything here is a plain value: produced once by the pipeline and never
//! mutated afterwards.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symmetric uncertainty band around a point estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub half_width: f64,
}

impl ConfidenceInterval {
    pub fn around(point: f64, half_width: f64) -> Self {
        Self {
            lower: point - half_width,
            upper: point + half_width,
            half_width,
        }
    }
}

/// One step of a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 1-indexed step within the horizon.
    pub step: usize,
    pub date: NaiveDate,
    /// Full predicted feature vector in original scale, in feature order.
    pub features: Vec<f64>,
    pub close: f64,
    pub interval: ConfidenceInterval,
}

/// Recursive forecast path.
///
/// Step `i` was conditioned on the predictions of steps `1..i`, never on new
/// observations, so expected error grows with the step index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPath {
    pub steps: Vec<Prediction>,
}

impl ForecastPath {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.steps.iter().map(|p| p.close).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Up => write!(f, "up"),
            Trend::Down => write!(f, "down"),
        }
    }
}

/// Aggregate view of a forecast path relative to the latest actual close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub latest_close: f64,
    pub first_predicted_close: f64,
    pub final_predicted_close: f64,
    pub net_change: f64,
    /// `None` when the latest close is zero.
    pub net_change_percent: Option<f64>,
    pub min_predicted_close: f64,
    pub max_predicted_close: f64,
    pub mean_predicted_close: f64,
    pub trend: Trend,
}

impl ForecastSummary {
    /// Returns `None` for an empty path.
    pub fn from_path(path: &ForecastPath, latest_close: f64) -> Option<Self> {
        let first = path.steps.first()?.close;
        let last = path.steps.last()?.close;
        let closes = path.closes();

        let min = closes.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = closes.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mean = closes.iter().sum::<f64>() / closes.len() as f64;
        let net_change = last - latest_close;

        Some(Self {
            latest_close,
            first_predicted_close: first,
            final_predicted_close: last,
            net_change,
            net_change_percent: percent_change(latest_close, last),
            min_predicted_close: min,
            max_predicted_close: max,
            mean_predicted_close: mean,
            trend: if last > latest_close {
                Trend::Up
            } else {
                Trend::Down
            },
        })
    }
}

/// Where the uncertainty magnitude came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "sigma", rename_all = "snake_case")]
pub enum SigmaEstimate {
    /// Residual standard deviation from a prior backtest.
    Backtest(f64),
    /// Return volatility scaled by price level and safety margin.
    VolatilityProxy(f64),
}

impl SigmaEstimate {
    pub fn value(&self) -> f64 {
        match self {
            SigmaEstimate::Backtest(s) | SigmaEstimate::VolatilityProxy(s) => *s,
        }
    }
}

/// Result of a single-step prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextDayPrediction {
    pub ticker: String,
    pub prediction: Prediction,
    pub latest_date: NaiveDate,
    pub latest_close: f64,
    pub change: f64,
    pub change_percent: Option<f64>,
    pub sigma: SigmaEstimate,
    pub generated_at: DateTime<Utc>,
}

/// Result of a multi-step recursive forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiDayForecast {
    pub ticker: String,
    pub horizon: usize,
    pub path: ForecastPath,
    pub summary: ForecastSummary,
    pub confidence_z: f64,
    pub sigma: SigmaEstimate,
    pub generated_at: DateTime<Utc>,
}

/// Qualitative banding of the skill score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ModelQuality {
    pub fn from_skill(skill_score: f64) -> Self {
        if skill_score > 0.30 {
            ModelQuality::Excellent
        } else if skill_score > 0.15 {
            ModelQuality::Good
        } else if skill_score > 0.0 {
            ModelQuality::Fair
        } else {
            ModelQuality::Poor
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ModelQuality::Excellent => "Excellent - significantly beats baseline",
            ModelQuality::Good => "Good - beats baseline",
            ModelQuality::Fair => "Fair - slightly beats baseline",
            ModelQuality::Poor => "Poor - does not beat baseline",
        }
    }
}

/// Error metrics of a held-out backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    /// Percent. `None` when every actual is zero.
    pub mape: Option<f64>,
    pub r2: f64,
    pub naive_rmse: f64,
    /// `1 - rmse / naive_rmse`, 0.0 when the naive RMSE is zero.
    pub skill_score: f64,
    /// Fraction in [0, 1]. `None` when the actual series never moved.
    pub directional_accuracy: Option<f64>,
    pub residual_std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub ticker: String,
    pub test_samples: usize,
    pub metrics: BacktestMetrics,
    pub beats_naive: bool,
    pub quality: ModelQuality,
}

impl BacktestReport {
    /// Residual standard deviation for later confidence estimation.
    pub fn residual_std(&self) -> f64 {
        self.metrics.residual_std
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Loaded,
    NotLoaded,
}

/// Static description of the loaded predictor and its input contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    pub status: ModelStatus,
    pub name: Option<String>,
    pub version: Option<String>,
    pub input_shape: [usize; 3],
    pub output_shape: [usize; 2],
    pub window_size: usize,
    pub features: Vec<String>,
    pub parameter_count: Option<u64>,
}

pub(crate) fn percent_change(from: f64, to: f64) -> Option<f64> {
    if from == 0.0 {
        None
    } else {
        Some((to - from) / from * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(i: usize, close: f64) -> Prediction {
        Prediction {
            step: i,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            features: vec![close],
            close,
            interval: ConfidenceInterval::around(close, 1.0),
        }
    }

    #[test]
    fn test_summary_from_path() {
        let path = ForecastPath {
            steps: vec![step(1, 101.0), step(2, 99.0), step(3, 104.0)],
        };

        let summary = ForecastSummary::from_path(&path, 100.0).unwrap();
        assert_eq!(summary.first_predicted_close, 101.0);
        assert_eq!(summary.final_predicted_close, 104.0);
        assert_eq!(summary.min_predicted_close, 99.0);
        assert_eq!(summary.max_predicted_close, 104.0);
        assert!((summary.mean_predicted_close - 101.333_333).abs() < 1e-5);
        assert!((summary.net_change - 4.0).abs() < 1e-12);
        assert_eq!(summary.net_change_percent, Some(4.0));
        assert_eq!(summary.trend, Trend::Up);
    }

    #[test]
    fn test_summary_flat_is_down_and_zero_close_guarded() {
        let path = ForecastPath {
            steps: vec![step(1, 0.0)],
        };
        let summary = ForecastSummary::from_path(&path, 0.0).unwrap();
        assert_eq!(summary.trend, Trend::Down);
        assert_eq!(summary.net_change_percent, None);
    }

    #[test]
    fn test_quality_bands() {
        assert_eq!(ModelQuality::from_skill(0.31), ModelQuality::Excellent);
        assert_eq!(ModelQuality::from_skill(0.30), ModelQuality::Good);
        assert_eq!(ModelQuality::from_skill(0.16), ModelQuality::Good);
        assert_eq!(ModelQuality::from_skill(0.01), ModelQuality::Fair);
        assert_eq!(ModelQuality::from_skill(0.0), ModelQuality::Poor);
        assert_eq!(ModelQuality::from_skill(-1.2), ModelQuality::Poor);
    }
}
