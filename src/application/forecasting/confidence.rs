//! Uncertainty bands for recursive forecasts.
//!
//! The default estimator assumes independent additive shocks per step, so the
//! band grows with `sqrt(step)`. This is a random-walk approximation around a
//! sigma estimate, not a fitted predictive interval.

use crate::domain::forecast::{ConfidenceInterval, SigmaEstimate};
use crate::domain::market::time_series::simple_returns;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;
use std::str::FromStr;
use tracing::debug;

/// Strategy producing a confidence interval for a forecast step.
pub trait ConfidenceEstimator: Send + Sync {
    /// `step` is 1-indexed.
    fn interval(&self, point: f64, step: usize) -> ConfidenceInterval;

    fn name(&self) -> &str;
}

/// Half-width `z * sigma * sqrt(step)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SqrtTimeEstimator {
    sigma: f64,
    z: f64,
}

impl SqrtTimeEstimator {
    pub fn new(sigma: f64, z: f64) -> Self {
        Self {
            sigma: sanitize(sigma),
            z: sanitize(z),
        }
    }

    pub fn half_width(&self, step: usize) -> f64 {
        self.z * self.sigma * (step.max(1) as f64).sqrt()
    }
}

impl ConfidenceEstimator for SqrtTimeEstimator {
    fn interval(&self, point: f64, step: usize) -> ConfidenceInterval {
        ConfidenceInterval::around(point, self.half_width(step))
    }

    fn name(&self) -> &str {
        "sqrt-time random walk"
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() { value.abs() } else { 0.0 }
}

/// Two-sided critical value for a coverage probability, e.g. 0.95 -> 1.96.
pub fn z_for_coverage(coverage: f64) -> anyhow::Result<f64> {
    if !(coverage > 0.0 && coverage < 1.0) {
        anyhow::bail!("Coverage must be in (0, 1), got {}", coverage);
    }
    let normal = Normal::new(0.0, 1.0)?;
    Ok(normal.inverse_cdf(0.5 + coverage / 2.0))
}

/// Price-level sigma proxy from recent return volatility.
///
/// `std(simple returns) * latest close * safety_margin`. Returns 0.0 when
/// fewer than two returns are available.
pub fn volatility_proxy_sigma(closes: &[f64], safety_margin: f64) -> f64 {
    let returns = simple_returns(closes);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_volatility = returns.iter().std_dev();
    let latest = closes.last().copied().unwrap_or(0.0);
    let sigma = daily_volatility * latest * safety_margin;
    if sigma.is_finite() { sigma.abs() } else { 0.0 }
}

/// Which sigma source wins when both are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigmaPrecedence {
    /// Prefer the backtested residual std, fall back to the volatility proxy.
    Backtest,
    /// Always use the volatility proxy.
    Volatility,
}

impl FromStr for SigmaPrecedence {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "backtest" => Ok(SigmaPrecedence::Backtest),
            "volatility" => Ok(SigmaPrecedence::Volatility),
            _ => anyhow::bail!(
                "Invalid SIGMA_PRECEDENCE: {}. Must be 'backtest' or 'volatility'",
                s
            ),
        }
    }
}

/// Picks the sigma for a forecast run.
pub fn resolve_sigma(
    backtest_residual_std: Option<f64>,
    closes: &[f64],
    safety_margin: f64,
    precedence: SigmaPrecedence,
) -> SigmaEstimate {
    let backtest = backtest_residual_std.filter(|s| s.is_finite() && *s >= 0.0);
    let estimate = match (precedence, backtest) {
        (SigmaPrecedence::Backtest, Some(sigma)) => SigmaEstimate::Backtest(sigma),
        _ => SigmaEstimate::VolatilityProxy(volatility_proxy_sigma(closes, safety_margin)),
    };
    debug!("Resolved sigma: {:?}", estimate);
    estimate
}
