//! Held-out backtest of the predictor against a lag-1 persistence baseline.
//!
//! Unlike the recursive forecaster, every input window here is real
//! history, so the scores measure one-step accuracy only.

use crate::application::ml::predictor::SequencePredictor;
use crate::application::ml::scaler::ScalingModel;
use crate::application::ml::sequence::create_sequences;
use crate::domain::errors::{ForecastError, PredictorError};
use crate::domain::forecast::{BacktestMetrics, BacktestReport, ModelQuality};
use crate::domain::market::time_series::TimeSeries;
use crate::domain::ml::feature_registry::FeatureSet;
use ndarray::Axis;
use statrs::statistics::Statistics;
use tracing::info;

pub const DEFAULT_MIN_TEST_SEQUENCES: usize = 10;

pub struct MetricsEvaluator<'a> {
    predictor: &'a dyn SequencePredictor,
    features: &'a FeatureSet,
    window_size: usize,
    min_test_sequences: usize,
}

impl<'a> MetricsEvaluator<'a> {
    pub fn new(
        predictor: &'a dyn SequencePredictor,
        features: &'a FeatureSet,
        window_size: usize,
    ) -> Self {
        Self {
            predictor,
            features,
            window_size,
            min_test_sequences: DEFAULT_MIN_TEST_SEQUENCES,
        }
    }

    pub fn with_min_test_sequences(mut self, min: usize) -> Self {
        self.min_test_sequences = min.max(1);
        self
    }

    /// Splits `series` chronologically, fits the scaler on the train block
    /// only, and scores one batched prediction per test window.
    pub fn evaluate(
        &self,
        series: &TimeSeries,
        test_fraction: f64,
    ) -> Result<BacktestReport, ForecastError> {
        let (train, test) = series.split_tail(test_fraction)?;
        if train.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let scaler = ScalingModel::fit(self.features.extract(&train)?.view())?;
        info!(
            "Backtest {}: scaler fitted on {} train rows, {} test rows",
            series.symbol(),
            train.len(),
            test.len()
        );

        let available = test.len().saturating_sub(self.window_size);
        if available < self.min_test_sequences {
            return Err(ForecastError::InsufficientTestData {
                required: self.min_test_sequences,
                available,
            });
        }
        let test_matrix = scaler.transform(self.features.extract(&test)?.view())?;
        let sequences = create_sequences(test_matrix.view(), self.window_size)?;

        let predictions_scaled = self.predictor.predict(sequences.windows.view())?;
        let expected = (sequences.len(), self.features.len());
        if predictions_scaled.dim() != expected {
            return Err(PredictorError::Shape {
                expected: format!("[{}, {}]", expected.0, expected.1),
                actual: format!("{:?}", predictions_scaled.shape()),
            }
            .into());
        }
        if predictions_scaled.iter().any(|v| !v.is_finite()) {
            return Err(PredictorError::Inference {
                reason: "predictor returned non-finite values".to_string(),
            }
            .into());
        }

        let predictions = scaler.inverse_transform(predictions_scaled.view())?;
        let actuals = scaler.inverse_transform(sequences.targets.view())?;

        let close = self.features.close_index();
        let predicted: Vec<f64> = predictions.index_axis(Axis(1), close).to_vec();
        let actual: Vec<f64> = actuals.index_axis(Axis(1), close).to_vec();

        let metrics = compute_metrics(&actual, &predicted);
        let beats_naive = metrics.rmse < metrics.naive_rmse;
        let quality = ModelQuality::from_skill(metrics.skill_score);

        info!(
            "Backtest {}: rmse={:.4} naive_rmse={:.4} skill={:.4} ({:?})",
            series.symbol(),
            metrics.rmse,
            metrics.naive_rmse,
            metrics.skill_score,
            quality
        );

        Ok(BacktestReport {
            ticker: series.symbol().to_string(),
            test_samples: sequences.len(),
            metrics,
            beats_naive,
            quality,
        })
    }
}

/// Scores aligned `actual` and `predicted` close prices.
///
/// Callers pass equal, non-empty slices.
pub fn compute_metrics(actual: &[f64], predicted: &[f64]) -> BacktestMetrics {
    let n = actual.len().min(predicted.len());
    let actual = &actual[..n];
    let predicted = &predicted[..n];

    let residuals: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();

    let mse = mean(residuals.iter().map(|r| r * r));
    let rmse = mse.sqrt();
    let mae = mean(residuals.iter().map(|r| r.abs()));

    let naive_rmse = mean(actual.windows(2).map(|w| (w[1] - w[0]).powi(2))).sqrt();
    let skill_score = skill_score(rmse, naive_rmse);

    let residual_std = if residuals.is_empty() {
        0.0
    } else {
        residuals.iter().population_std_dev()
    };

    BacktestMetrics {
        mse,
        rmse,
        mae,
        mape: mape(actual, predicted),
        r2: r_squared(actual, predicted),
        naive_rmse,
        skill_score,
        directional_accuracy: directional_accuracy(actual, predicted),
        residual_std,
    }
}

/// `1 - rmse / naive_rmse`; 0.0 when the baseline error is zero.
pub fn skill_score(rmse: f64, naive_rmse: f64) -> f64 {
    if naive_rmse == 0.0 {
        0.0
    } else {
        1.0 - rmse / naive_rmse
    }
}

/// Mean absolute percentage error over non-zero actuals.
fn mape(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let terms: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(mean(terms.into_iter()) * 100.0)
    }
}

fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let actual_mean = mean(actual.iter().copied());
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - actual_mean).powi(2)).sum();
    if ss_tot == 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// Share of actual up/down moves whose direction the predictions matched.
///
/// Flat actual steps are not counted. `None` when the actual never moved.
fn directional_accuracy(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let mut moves = 0usize;
    let mut correct = 0usize;
    for (a, p) in actual.windows(2).zip(predicted.windows(2)) {
        let actual_dir = direction(a[1] - a[0]);
        if actual_dir == 0 {
            continue;
        }
        moves += 1;
        if direction(p[1] - p[0]) == actual_dir {
            correct += 1;
        }
    }
    if moves == 0 {
        None
    } else {
        Some(correct as f64 / moves as f64)
    }
}

fn direction(delta: f64) -> i8 {
    if delta > 0.0 {
        1
    } else if delta < 0.0 {
        -1
    } else {
        0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}
