//! Open-loop multi-step forecasting.
//!
//! Each step feeds the model's own scaled prediction back into the input
//! window; no new observations enter after the seed window. Errors therefore
//! compound, and expected accuracy degrades as the horizon grows.

use crate::application::forecasting::calendar::next_business_day;
use crate::application::forecasting::confidence::ConfidenceEstimator;
use crate::application::ml::predictor::SequencePredictor;
use crate::application::ml::scaler::ScalingModel;
use crate::application::ml::sequence::SequenceWindow;
use crate::domain::errors::{ForecastError, PredictorError};
use crate::domain::forecast::{ForecastPath, Prediction};
use chrono::NaiveDate;
use tracing::{debug, warn};

pub const DEFAULT_MAX_HORIZON: usize = 30;

/// Clamps a requested horizon into `[1, max_horizon]`.
///
/// Out-of-range requests are clamped rather than rejected.
pub fn clamp_horizon(requested: usize, max_horizon: usize) -> usize {
    let clamped = requested.clamp(1, max_horizon.max(1));
    if clamped != requested {
        warn!(
            "Requested horizon {} outside [1, {}], clamped to {}",
            requested, max_horizon, clamped
        );
    }
    clamped
}

/// Forecaster state between steps.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastState {
    /// Number of completed steps.
    pub step: usize,
    pub window: SequenceWindow,
    /// Date of the most recent row in `window`.
    pub last_date: NaiveDate,
}

impl ForecastState {
    pub fn new(window: SequenceWindow, last_date: NaiveDate) -> Self {
        Self {
            step: 0,
            window,
            last_date,
        }
    }
}

pub struct RecursiveForecaster<'a> {
    predictor: &'a dyn SequencePredictor,
    scaler: &'a ScalingModel,
    estimator: &'a dyn ConfidenceEstimator,
    close_index: usize,
    max_horizon: usize,
}

impl<'a> RecursiveForecaster<'a> {
    pub fn new(
        predictor: &'a dyn SequencePredictor,
        scaler: &'a ScalingModel,
        estimator: &'a dyn ConfidenceEstimator,
        close_index: usize,
    ) -> Self {
        Self {
            predictor,
            scaler,
            estimator,
            close_index,
            max_horizon: DEFAULT_MAX_HORIZON,
        }
    }

    pub fn with_max_horizon(mut self, max_horizon: usize) -> Self {
        self.max_horizon = max_horizon.max(1);
        self
    }

    /// Advances one step: predict, inverse-scale, date, annotate, slide.
    pub fn step(&self, state: &ForecastState) -> Result<(Prediction, ForecastState), ForecastError> {
        let input = state.window.to_input();
        let output = self.predictor.predict(input.view())?;

        let width = state.window.num_features();
        if output.dim() != (1, width) {
            return Err(PredictorError::Shape {
                expected: format!("[1, {}]", width),
                actual: format!("{:?}", output.shape()),
            }
            .into());
        }

        let scaled_row = output.row(0).to_vec();
        if scaled_row.iter().any(|v| !v.is_finite()) {
            return Err(PredictorError::Inference {
                reason: "predictor returned non-finite values".to_string(),
            }
            .into());
        }

        let features = self.scaler.inverse_transform_row(&scaled_row)?;
        let close = features
            .get(self.close_index)
            .copied()
            .ok_or(ForecastError::DimensionMismatch {
                expected: self.close_index + 1,
                actual: features.len(),
            })?;

        let step = state.step + 1;
        let date = next_business_day(state.last_date);
        let prediction = Prediction {
            step,
            date,
            features,
            close,
            interval: self.estimator.interval(close, step),
        };

        let next = ForecastState {
            step,
            window: state.window.slide(&scaled_row)?,
            last_date: date,
        };

        debug!("Forecast step {} -> {:.4} on {}", step, close, date);
        Ok((prediction, next))
    }

    /// Runs `horizon` steps (clamped) from the seed window.
    ///
    /// Any failing step aborts the run; no partial path is returned.
    pub fn run(
        &self,
        seed: SequenceWindow,
        last_date: NaiveDate,
        horizon: usize,
    ) -> Result<ForecastPath, ForecastError> {
        let horizon = clamp_horizon(horizon, self.max_horizon);
        let mut state = ForecastState::new(seed, last_date);
        let mut steps = Vec::with_capacity(horizon);

        while state.step < horizon {
            let (prediction, next) = self.step(&state)?;
            steps.push(prediction);
            state = next;
        }

        Ok(ForecastPath { steps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::forecasting::confidence::SqrtTimeEstimator;
    use crate::infrastructure::mock::{FailingPredictor, LastValuePredictor, ShapeShiftPredictor};
    use ndarray::array;

    fn friday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 8).unwrap()
    }

    fn setup() -> (ScalingModel, SequenceWindow) {
        let history = array![[10.0], [11.0], [12.0]];
        let scaler = ScalingModel::fit(history.view()).unwrap();
        let window = SequenceWindow::new(scaler.transform(history.view()).unwrap()).unwrap();
        (scaler, window)
    }

    #[test]
    fn test_flat_feedback_scenario() {
        let (scaler, seed) = setup();
        let estimator = SqrtTimeEstimator::new(0.0, 1.96);
        let forecaster = RecursiveForecaster::new(&LastValuePredictor, &scaler, &estimator, 0);

        let path = forecaster.run(seed, friday(), 3).unwrap();
        let closes = path.closes();
        assert_eq!(closes.len(), 3);
        for close in closes {
            assert!((close - 12.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_steps_are_indexed_and_dated() {
        let (scaler, seed) = setup();
        let estimator = SqrtTimeEstimator::new(1.0, 1.96);
        let forecaster = RecursiveForecaster::new(&LastValuePredictor, &scaler, &estimator, 0);

        let path = forecaster.run(seed, friday(), 4).unwrap();
        let indices: Vec<usize> = path.steps.iter().map(|p| p.step).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);

        let dates: Vec<String> = path.steps.iter().map(|p| p.date.to_string()).collect();
        assert_eq!(
            dates,
            vec!["2024-03-11", "2024-03-12", "2024-03-13", "2024-03-14"]
        );

        let widths: Vec<f64> = path.steps.iter().map(|p| p.interval.half_width).collect();
        assert!(widths.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_state_is_inspectable_between_steps() {
        let (scaler, seed) = setup();
        let estimator = SqrtTimeEstimator::new(0.0, 1.96);
        let forecaster = RecursiveForecaster::new(&LastValuePredictor, &scaler, &estimator, 0);

        let state = ForecastState::new(seed.clone(), friday());
        let (_, next) = forecaster.step(&state).unwrap();

        assert_eq!(next.step, 1);
        assert_eq!(next.window.rows(), array![[0.5], [1.0], [1.0]].view());
        // The input state is untouched
        assert_eq!(state.window, seed);
    }

    #[test]
    fn test_horizon_is_clamped() {
        let (scaler, seed) = setup();
        let estimator = SqrtTimeEstimator::new(0.0, 1.96);
        let forecaster = RecursiveForecaster::new(&LastValuePredictor, &scaler, &estimator, 0)
            .with_max_horizon(5);

        assert_eq!(forecaster.run(seed.clone(), friday(), 0).unwrap().len(), 1);
        assert_eq!(forecaster.run(seed, friday(), 50).unwrap().len(), 5);
        assert_eq!(clamp_horizon(7, 30), 7);
    }

    #[test]
    fn test_failure_mid_path_aborts() {
        let (scaler, seed) = setup();
        let estimator = SqrtTimeEstimator::new(0.0, 1.96);
        let failing = FailingPredictor::after(2);
        let forecaster = RecursiveForecaster::new(&failing, &scaler, &estimator, 0);

        let result = forecaster.run(seed, friday(), 5);
        assert!(matches!(result, Err(ForecastError::Predictor(_))));
    }

    #[test]
    fn test_wrong_output_shape_is_rejected() {
        let (scaler, seed) = setup();
        let estimator = SqrtTimeEstimator::new(0.0, 1.96);
        let predictor = ShapeShiftPredictor { width: 2 };
        let forecaster = RecursiveForecaster::new(&predictor, &scaler, &estimator, 0);

        let result = forecaster.run(seed, friday(), 1);
        assert!(matches!(
            result,
            Err(ForecastError::Predictor(PredictorError::Shape { .. }))
        ));
    }
}
