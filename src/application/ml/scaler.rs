//! Per-feature min-max scaling.
//!
//! A `ScalingModel` only exists in a fitted state: it is produced by `fit`
//! (or rebuilt from persisted parameters) and never mutated afterwards, so a
//! single instance can be shared read-only between concurrent requests.

use crate::domain::errors::ForecastError;
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingModel {
    data_min: Vec<f64>,
    data_max: Vec<f64>,
}

impl ScalingModel {
    /// Learns per-column min and max from a `[rows, features]` matrix.
    pub fn fit(matrix: ArrayView2<f64>) -> Result<Self, ForecastError> {
        if matrix.nrows() == 0 {
            return Err(ForecastError::EmptySeries);
        }
        if matrix.ncols() == 0 {
            return Err(ForecastError::MalformedFeatureSet {
                reason: "matrix has no feature columns".to_string(),
            });
        }
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::InvalidSeries {
                reason: "cannot fit scaler on non-finite values".to_string(),
            });
        }

        let data_min = matrix
            .axis_iter(Axis(1))
            .map(|col| col.iter().cloned().fold(f64::INFINITY, f64::min))
            .collect();
        let data_max = matrix
            .axis_iter(Axis(1))
            .map(|col| col.iter().cloned().fold(f64::NEG_INFINITY, f64::max))
            .collect();

        Ok(Self { data_min, data_max })
    }

    /// Rebuilds a model from stored parameters.
    pub fn from_params(data_min: Vec<f64>, data_max: Vec<f64>) -> Result<Self, ForecastError> {
        if data_min.is_empty() || data_min.len() != data_max.len() {
            return Err(ForecastError::InvalidScaler {
                reason: format!(
                    "expected equal, non-empty min/max vectors, got {} and {}",
                    data_min.len(),
                    data_max.len()
                ),
            });
        }
        for (j, (lo, hi)) in data_min.iter().zip(&data_max).enumerate() {
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(ForecastError::InvalidScaler {
                    reason: format!("feature {} has min {} and max {}", j, lo, hi),
                });
            }
        }
        Ok(Self { data_min, data_max })
    }

    pub fn num_features(&self) -> usize {
        self.data_min.len()
    }

    pub fn data_min(&self) -> &[f64] {
        &self.data_min
    }

    pub fn data_max(&self) -> &[f64] {
        &self.data_max
    }

    /// Span used for feature `j`. A constant feature uses a span of 1, so it
    /// maps to 0 and inverts back to its constant value.
    fn span(&self, j: usize) -> f64 {
        let range = self.data_max[j] - self.data_min[j];
        if range == 0.0 { 1.0 } else { range }
    }

    /// `(x - min) / (max - min)` per feature. Values outside the fitted range
    /// extrapolate linearly; nothing is clamped.
    pub fn transform(&self, matrix: ArrayView2<f64>) -> Result<Array2<f64>, ForecastError> {
        self.check_width(matrix.ncols())?;
        Ok(Array2::from_shape_fn(matrix.dim(), |(i, j)| {
            (matrix[[i, j]] - self.data_min[j]) / self.span(j)
        }))
    }

    /// `x * (max - min) + min` per feature.
    pub fn inverse_transform(&self, matrix: ArrayView2<f64>) -> Result<Array2<f64>, ForecastError> {
        self.check_width(matrix.ncols())?;
        Ok(Array2::from_shape_fn(matrix.dim(), |(i, j)| {
            matrix[[i, j]] * self.span(j) + self.data_min[j]
        }))
    }

    pub fn inverse_transform_row(&self, row: &[f64]) -> Result<Vec<f64>, ForecastError> {
        self.check_width(row.len())?;
        Ok(row
            .iter()
            .enumerate()
            .map(|(j, x)| x * self.span(j) + self.data_min[j])
            .collect())
    }

    fn check_width(&self, actual: usize) -> Result<(), ForecastError> {
        if actual != self.num_features() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.num_features(),
                actual,
            });
        }
        Ok(())
    }
}
