//! Sliding-window sequence construction.

use crate::domain::errors::ForecastError;
use ndarray::{Array2, Array3, ArrayView2, Axis, s};

/// Fixed-length block of scaled feature rows, oldest first.
///
/// This is the forecaster's state value: `slide` returns a new window and
/// leaves the original untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceWindow {
    rows: Array2<f64>,
}

impl SequenceWindow {
    pub fn new(rows: Array2<f64>) -> Result<Self, ForecastError> {
        if rows.nrows() == 0 {
            return Err(ForecastError::InvalidWindowSize);
        }
        if rows.ncols() == 0 {
            return Err(ForecastError::MalformedFeatureSet {
                reason: "window has no feature columns".to_string(),
            });
        }
        Ok(Self { rows })
    }

    pub fn window_size(&self) -> usize {
        self.rows.nrows()
    }

    pub fn num_features(&self) -> usize {
        self.rows.ncols()
    }

    pub fn rows(&self) -> ArrayView2<'_, f64> {
        self.rows.view()
    }

    pub fn last_row(&self) -> Vec<f64> {
        self.rows.row(self.rows.nrows() - 1).to_vec()
    }

    /// Reshapes to the predictor input `[1, window_size, num_features]`.
    pub fn to_input(&self) -> Array3<f64> {
        self.rows.clone().insert_axis(Axis(0))
    }

    /// Drops the oldest row and appends `new_row`.
    pub fn slide(&self, new_row: &[f64]) -> Result<SequenceWindow, ForecastError> {
        if new_row.len() != self.num_features() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.num_features(),
                actual: new_row.len(),
            });
        }

        let w = self.window_size();
        let rows = Array2::from_shape_fn(self.rows.dim(), |(i, j)| {
            if i + 1 < w {
                self.rows[[i + 1, j]]
            } else {
                new_row[j]
            }
        });
        Ok(SequenceWindow { rows })
    }
}

/// Supervised pairs built from a scaled matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceSet {
    /// `[pairs, window_size, num_features]`
    pub windows: Array3<f64>,
    /// `[pairs, num_features]`
    pub targets: Array2<f64>,
}

impl SequenceSet {
    pub fn len(&self) -> usize {
        self.targets.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.nrows() == 0
    }
}

/// For every `i` in `[window_size, len)`, emits `matrix[i - window_size..i]`
/// as input and `matrix[i]` as target.
pub fn create_sequences(
    matrix: ArrayView2<f64>,
    window_size: usize,
) -> Result<SequenceSet, ForecastError> {
    if window_size == 0 {
        return Err(ForecastError::InvalidWindowSize);
    }
    let n = matrix.nrows();
    if n < window_size + 1 {
        return Err(ForecastError::InsufficientData {
            required: window_size + 1,
            available: n,
        });
    }

    let pairs = n - window_size;
    let features = matrix.ncols();
    let windows = Array3::from_shape_fn((pairs, window_size, features), |(p, t, f)| {
        matrix[[p + t, f]]
    });
    let targets = matrix.slice(s![window_size.., ..]).to_owned();

    Ok(SequenceSet { windows, targets })
}

/// The last `window_size` rows, used to seed recursive forecasting.
pub fn prepare_latest_window(
    matrix: ArrayView2<f64>,
    window_size: usize,
) -> Result<SequenceWindow, ForecastError> {
    if window_size == 0 {
        return Err(ForecastError::InvalidWindowSize);
    }
    let n = matrix.nrows();
    if n < window_size {
        return Err(ForecastError::InsufficientData {
            required: window_size,
            available: n,
        });
    }
    SequenceWindow::new(matrix.slice(s![n - window_size.., ..]).to_owned())
}
