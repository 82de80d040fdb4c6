//! Entry point for forecast requests.
//!
//! Market data is fetched asynchronously; the numeric pipeline (scaling,
//! windowing, predictor calls) then runs on the blocking pool. Each request
//! either fits its own scaler or reads the shared persisted one, never both.

use crate::application::forecasting::confidence::{
    SigmaPrecedence, SqrtTimeEstimator, resolve_sigma,
};
use crate::application::forecasting::metrics_evaluator::MetricsEvaluator;
use crate::application::forecasting::recursive_forecaster::{RecursiveForecaster, clamp_horizon};
use crate::application::ml::predictor::{SequencePredictor, TimedPredictor};
use crate::application::ml::scaler::ScalingModel;
use crate::application::ml::sequence::prepare_latest_window;
use crate::config::Config;
use crate::domain::errors::ForecastError;
use crate::domain::forecast::{
    BacktestReport, ForecastPath, ForecastSummary, ModelDescription, ModelStatus,
    MultiDayForecast, NextDayPrediction, SigmaEstimate, percent_change,
};
use crate::domain::market::time_series::TimeSeries;
use crate::domain::ml::feature_registry::FeatureSet;
use crate::domain::ports::{MarketDataProvider, normalize_ticker};
use crate::infrastructure::scaler_persistence::ScalerArtifact;
use chrono::{NaiveDate, Utc};
use ndarray::{Array2, Axis, concatenate};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Everything the blocking part of a forecast needs, cheap to clone.
#[derive(Clone)]
struct PipelineContext {
    predictor: Arc<dyn SequencePredictor>,
    scaler: Option<Arc<ScalingModel>>,
    features: FeatureSet,
    window_size: usize,
    max_horizon: usize,
    confidence_z: f64,
    safety_margin: f64,
    precedence: SigmaPrecedence,
}

struct PipelineOutput {
    path: ForecastPath,
    sigma: SigmaEstimate,
    latest_date: NaiveDate,
    latest_close: f64,
}

impl PipelineContext {
    fn run(
        &self,
        series: &TimeSeries,
        horizon: usize,
        backtest_residual_std: Option<f64>,
    ) -> Result<PipelineOutput, ForecastError> {
        let latest = series.last().ok_or(ForecastError::EmptySeries)?;
        let matrix = self.features.extract(series)?;

        let scaler = match &self.scaler {
            Some(shared) => Arc::clone(shared),
            None => Arc::new(ScalingModel::fit(matrix.view())?),
        };
        let scaled = scaler.transform(matrix.view())?;
        let seed = prepare_latest_window(scaled.view(), self.window_size)?;

        let closes = series.closes();
        let sigma = resolve_sigma(
            backtest_residual_std,
            &closes,
            self.safety_margin,
            self.precedence,
        );
        let estimator = SqrtTimeEstimator::new(sigma.value(), self.confidence_z);

        let forecaster = RecursiveForecaster::new(
            self.predictor.as_ref(),
            scaler.as_ref(),
            &estimator,
            self.features.close_index(),
        )
        .with_max_horizon(self.max_horizon);
        let path = forecaster.run(seed, latest.date(), horizon)?;

        Ok(PipelineOutput {
            path,
            sigma,
            latest_date: latest.date(),
            latest_close: latest.close_f64(),
        })
    }
}

pub struct ForecastingService {
    config: Config,
    market_data: Arc<dyn MarketDataProvider>,
    predictor: Option<Arc<dyn SequencePredictor>>,
    scaler: Option<Arc<ScalingModel>>,
    /// Backtested residual std per ticker.
    residuals: RwLock<HashMap<String, f64>>,
}

impl ForecastingService {
    /// Every predictor call is bounded by the configured timeout.
    pub fn new(
        config: Config,
        market_data: Arc<dyn MarketDataProvider>,
        predictor: Option<Arc<dyn SequencePredictor>>,
    ) -> Self {
        let timeout = config.model.predictor_timeout;
        let predictor = predictor.map(|inner| {
            Arc::new(TimedPredictor::new(inner, timeout)) as Arc<dyn SequencePredictor>
        });

        Self {
            config,
            market_data,
            predictor,
            scaler: None,
            residuals: RwLock::new(HashMap::new()),
        }
    }

    /// Uses a pre-fitted scaler read-only instead of fitting per request.
    pub fn with_scaler(mut self, scaler: Arc<ScalingModel>) -> Self {
        self.scaler = Some(scaler);
        self
    }

    /// Seeds the per-ticker residual cache, e.g. from earlier processes.
    pub fn with_residuals(mut self, residuals: HashMap<String, f64>) -> Self {
        self.residuals = RwLock::new(
            residuals
                .into_iter()
                .filter(|(_, sigma)| sigma.is_finite())
                .collect(),
        );
        self
    }

    /// Residual std remembered from the last backtest of `ticker`.
    pub async fn cached_residual_std(&self, ticker: &str) -> Option<f64> {
        let ticker = normalize_ticker(ticker).ok()?;
        self.residuals.read().await.get(&ticker).copied()
    }

    fn context(&self) -> Result<PipelineContext, ForecastError> {
        let predictor = self
            .predictor
            .as_ref()
            .ok_or(ForecastError::ModelUnavailable)?;
        let forecast = &self.config.forecast;

        Ok(PipelineContext {
            predictor: Arc::clone(predictor),
            scaler: self.scaler.clone(),
            features: forecast.features.clone(),
            window_size: forecast.window_size,
            max_horizon: forecast.max_horizon,
            confidence_z: forecast.confidence_z,
            safety_margin: forecast.volatility_safety_margin,
            precedence: forecast.sigma_precedence,
        })
    }

    async fn load_series(
        &self,
        ticker: &str,
        period_days: u32,
        prefetched: Option<TimeSeries>,
    ) -> Result<TimeSeries, ForecastError> {
        let series = match prefetched {
            Some(series) => series,
            None => self.market_data.fetch(ticker, period_days).await?,
        };

        let required = self.config.forecast.window_size + 1;
        if series.len() < required {
            warn!(
                "{}: {} bars available, {} required",
                ticker,
                series.len(),
                required
            );
            return Err(ForecastError::InsufficientData {
                required,
                available: series.len(),
            });
        }
        Ok(series)
    }

    async fn run_pipeline(
        &self,
        context: PipelineContext,
        ticker: &str,
        series: TimeSeries,
        horizon: usize,
    ) -> Result<PipelineOutput, ForecastError> {
        let residual = self.residuals.read().await.get(ticker).copied();

        tokio::task::spawn_blocking(move || context.run(&series, horizon, residual))
            .await
            .map_err(|e| ForecastError::TaskFailed {
                reason: e.to_string(),
            })?
    }

    /// Single-step prediction of the next business day's bar.
    pub async fn predict_next_day(
        &self,
        ticker: &str,
        series: Option<TimeSeries>,
    ) -> Result<NextDayPrediction, ForecastError> {
        let context = self.context()?;
        let ticker = normalize_ticker(ticker)?;
        let period =
            self.config.forecast.window_size as u32 + self.config.data.next_day_lookback_extra;
        let series = self.load_series(&ticker, period, series).await?;

        let output = self.run_pipeline(context, &ticker, series, 1).await?;
        let prediction = output
            .path
            .steps
            .into_iter()
            .next()
            .ok_or(ForecastError::EmptySeries)?;

        let change = prediction.close - output.latest_close;
        info!(
            "{}: next-day close {:.2} (latest {:.2} on {})",
            ticker, prediction.close, output.latest_close, output.latest_date
        );

        Ok(NextDayPrediction {
            ticker,
            change_percent: percent_change(output.latest_close, prediction.close),
            change,
            prediction,
            latest_date: output.latest_date,
            latest_close: output.latest_close,
            sigma: output.sigma,
            generated_at: Utc::now(),
        })
    }

    /// Recursive forecast over `horizon` business days (clamped).
    pub async fn forecast_multi_day(
        &self,
        ticker: &str,
        horizon: usize,
        series: Option<TimeSeries>,
    ) -> Result<MultiDayForecast, ForecastError> {
        let context = self.context()?;
        let ticker = normalize_ticker(ticker)?;
        let horizon = clamp_horizon(horizon, self.config.forecast.max_horizon);
        let period =
            self.config.forecast.window_size as u32 + self.config.data.multi_day_lookback_extra;
        let series = self.load_series(&ticker, period, series).await?;

        let output = self.run_pipeline(context, &ticker, series, horizon).await?;
        let summary = ForecastSummary::from_path(&output.path, output.latest_close)
            .ok_or(ForecastError::EmptySeries)?;

        info!(
            "{}: {}-day forecast ends at {:.2} ({}), sigma {:?}",
            ticker, horizon, summary.final_predicted_close, summary.trend, output.sigma
        );

        Ok(MultiDayForecast {
            ticker,
            horizon,
            path: output.path,
            summary,
            confidence_z: self.config.forecast.confidence_z,
            sigma: output.sigma,
            generated_at: Utc::now(),
        })
    }

    /// Backtests the predictor on the most recent `test_fraction` of history.
    ///
    /// The resulting residual std is remembered for later forecasts of the
    /// same ticker.
    pub async fn evaluate(
        &self,
        ticker: &str,
        test_fraction: Option<f64>,
    ) -> Result<BacktestReport, ForecastError> {
        let context = self.context()?;
        let ticker = normalize_ticker(ticker)?;
        let test_fraction = test_fraction.unwrap_or(self.config.forecast.default_test_fraction);
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(ForecastError::InvalidTestFraction {
                fraction: test_fraction,
            });
        }

        let series = self
            .market_data
            .fetch(&ticker, self.config.data.evaluation_lookback_days)
            .await?;
        let min_test_sequences = self.config.forecast.min_test_sequences;

        let report = tokio::task::spawn_blocking(move || {
            MetricsEvaluator::new(
                context.predictor.as_ref(),
                &context.features,
                context.window_size,
            )
            .with_min_test_sequences(min_test_sequences)
            .evaluate(&series, test_fraction)
        })
        .await
        .map_err(|e| ForecastError::TaskFailed {
            reason: e.to_string(),
        })??;

        let residual_std = report.residual_std();
        if residual_std.is_finite() {
            self.residuals
                .write()
                .await
                .insert(ticker.clone(), residual_std);
            info!(
                "{}: backtest verdict {:?}, residual std {:.4} cached",
                ticker, report.quality, residual_std
            );
        } else {
            warn!("{}: residual std {} not cached", ticker, residual_std);
        }
        Ok(report)
    }

    /// Describes the model and its input contract. Works without a model.
    pub fn describe_model(&self) -> ModelDescription {
        let forecast = &self.config.forecast;
        let num_features = forecast.features.len();

        ModelDescription {
            status: if self.predictor.is_some() {
                ModelStatus::Loaded
            } else {
                ModelStatus::NotLoaded
            },
            name: self.predictor.as_ref().map(|p| p.name().to_string()),
            version: self.predictor.as_ref().map(|p| p.version().to_string()),
            input_shape: [1, forecast.window_size, num_features],
            output_shape: [1, num_features],
            window_size: forecast.window_size,
            features: forecast.features.names(),
            parameter_count: self.predictor.as_ref().and_then(|p| p.parameter_count()),
        }
    }

    /// Fits one scaler over the pooled history of `tickers`.
    ///
    /// Does not need a loaded model.
    pub async fn fit_scaler(
        &self,
        tickers: &[String],
        period_days: u32,
    ) -> Result<ScalerArtifact, ForecastError> {
        let features = &self.config.forecast.features;
        let mut matrices: Vec<Array2<f64>> = Vec::with_capacity(tickers.len());
        let mut corpus = Vec::with_capacity(tickers.len());

        for ticker in tickers {
            let ticker = normalize_ticker(ticker)?;
            let series = self.market_data.fetch(&ticker, period_days).await?;
            matrices.push(features.extract(&series)?);
            corpus.push(ticker);
        }
        if matrices.is_empty() {
            return Err(ForecastError::EmptySeries);
        }

        let views: Vec<_> = matrices.iter().map(|m| m.view()).collect();
        let pooled = concatenate(Axis(0), &views).map_err(|e| ForecastError::InvalidSeries {
            reason: e.to_string(),
        })?;
        let model = ScalingModel::fit(pooled.view())?;

        info!(
            "Fitted scaler on {} rows from {}",
            pooled.nrows(),
            corpus.join(",")
        );
        Ok(ScalerArtifact::from_model(
            &model,
            features,
            corpus.join(","),
            pooled.nrows(),
        ))
    }
}
