use crate::application::forecasting::calendar::next_business_day;
use crate::application::ml::predictor::SequencePredictor;
use crate::domain::errors::{MarketDataError, PredictorError};
use crate::domain::market::time_series::{Bar, TimeSeries};
use crate::domain::ports::{MarketDataProvider, normalize_ticker};
use async_trait::async_trait;
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Utc, Weekday};
use ndarray::{Array2, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Persistence model: predicts the last row of every input window.
///
/// Fed its own output, it produces a perfectly flat forecast.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastValuePredictor;

impl SequencePredictor for LastValuePredictor {
    fn predict(&self, input: ArrayView3<f64>) -> Result<Array2<f64>, PredictorError> {
        let (batch, window, features) = input.dim();
        if window == 0 {
            return Ok(Array2::zeros((batch, features)));
        }
        Ok(input.index_axis(Axis(1), window - 1).to_owned())
    }

    fn name(&self) -> &str {
        "last-value"
    }

    fn version(&self) -> &str {
        "mock"
    }

    fn parameter_count(&self) -> Option<u64> {
        Some(0)
    }
}

/// Succeeds for the first `n` calls, then fails every call after.
#[derive(Debug, Default)]
pub struct FailingPredictor {
    succeed_for: usize,
    calls: AtomicUsize,
}

impl FailingPredictor {
    pub fn after(n: usize) -> Self {
        Self {
            succeed_for: n,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SequencePredictor for FailingPredictor {
    fn predict(&self, input: ArrayView3<f64>) -> Result<Array2<f64>, PredictorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.succeed_for {
            return LastValuePredictor.predict(input);
        }
        Err(PredictorError::Inference {
            reason: format!("mock failure on call {}", call + 1),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }

    fn version(&self) -> &str {
        "mock"
    }
}

/// Sleeps before answering like `LastValuePredictor`.
#[derive(Debug)]
pub struct SlowPredictor {
    delay: Duration,
    started: AtomicUsize,
}

impl SlowPredictor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: AtomicUsize::new(0),
        }
    }

    /// Calls that reached the model, finished or not.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

impl SequencePredictor for SlowPredictor {
    fn predict(&self, input: ArrayView3<f64>) -> Result<Array2<f64>, PredictorError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        LastValuePredictor.predict(input)
    }

    fn name(&self) -> &str {
        "slow"
    }

    fn version(&self) -> &str {
        "mock"
    }
}

/// Answers with a fixed output width regardless of the input features.
#[derive(Debug, Clone, Copy)]
pub struct ShapeShiftPredictor {
    pub width: usize,
}

impl SequencePredictor for ShapeShiftPredictor {
    fn predict(&self, input: ArrayView3<f64>) -> Result<Array2<f64>, PredictorError> {
        Ok(Array2::from_elem((input.dim().0, self.width), 0.5))
    }

    fn name(&self) -> &str {
        "shape-shift"
    }

    fn version(&self) -> &str {
        "mock"
    }
}

/// Answers every window with the same scaled value, NaN included.
#[derive(Debug, Clone, Copy)]
pub struct ConstantPredictor {
    pub value: f64,
}

impl SequencePredictor for ConstantPredictor {
    fn predict(&self, input: ArrayView3<f64>) -> Result<Array2<f64>, PredictorError> {
        let (batch, _, features) = input.dim();
        Ok(Array2::from_elem((batch, features), self.value))
    }

    fn name(&self) -> &str {
        "constant"
    }

    fn version(&self) -> &str {
        "mock"
    }
}

/// In-memory market data.
///
/// Either serves fixed series registered per ticker, or (when none are
/// registered) generates a deterministic random walk on business days.
pub struct MockMarketDataProvider {
    seed: u64,
    end_date: NaiveDate,
    fixed: HashMap<String, TimeSeries>,
}

impl MockMarketDataProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            end_date: Utc::now().date_naive(),
            fixed: HashMap::new(),
        }
    }

    /// Anchors generated walks so the last bar falls on or before `date`.
    pub fn with_end_date(mut self, date: NaiveDate) -> Self {
        self.end_date = date;
        self
    }

    /// Serves `series` for its symbol. Once any series is registered,
    /// unknown tickers are reported as not found.
    pub fn with_series(mut self, series: TimeSeries) -> Self {
        self.fixed.insert(series.symbol().to_uppercase(), series);
        self
    }

    fn random_walk(&self, ticker: &str, period_days: u32) -> Result<TimeSeries, MarketDataError> {
        let count = ((period_days as usize) * 5 / 7).max(1);
        let ticker_seed = ticker
            .bytes()
            .fold(self.seed, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut rng = StdRng::seed_from_u64(ticker_seed);

        let mut last = self.end_date;
        while matches!(last.weekday(), Weekday::Sat | Weekday::Sun) {
            last -= ChronoDuration::days(1);
        }
        // Walk back far enough, then step forward on business days
        let mut date = last - ChronoDuration::days((count as i64) * 7 / 5 + 7);
        let mut dates = Vec::with_capacity(count);
        while date <= last {
            date = next_business_day(date);
            if date <= last {
                dates.push(date);
            }
        }
        let dates = &dates[dates.len().saturating_sub(count)..];

        let mut price: f64 = rng.random_range(50.0..250.0);
        let mut bars = Vec::with_capacity(dates.len());
        for date in dates {
            let open = price;
            price *= 1.0 + rng.random_range(-0.02..0.02);
            let spread = price * rng.random_range(0.0..0.01);
            let high = open.max(price) + spread;
            let low = (open.min(price) - spread).max(0.01);
            bars.push(Bar {
                timestamp: date
                    .and_hms_opt(0, 0, 0)
                    .ok_or_else(|| MarketDataError::Parse {
                        ticker: ticker.to_string(),
                        reason: format!("invalid date {}", date),
                    })?
                    .and_utc(),
                open: to_price(open),
                high: to_price(high),
                low: to_price(low),
                close: to_price(price),
            });
        }

        TimeSeries::new(ticker, bars).map_err(|e| MarketDataError::Parse {
            ticker: ticker.to_string(),
            reason: e.to_string(),
        })
    }
}

impl Default for MockMarketDataProvider {
    fn default() -> Self {
        Self::new(42)
    }
}

fn to_price(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO).round_dp(2)
}

#[async_trait]
impl MarketDataProvider for MockMarketDataProvider {
    async fn fetch(&self, ticker: &str, period_days: u32) -> Result<TimeSeries, MarketDataError> {
        let ticker = normalize_ticker(ticker)?;

        if !self.fixed.is_empty() {
            return self
                .fixed
                .get(&ticker)
                .cloned()
                .ok_or(MarketDataError::NotFound { ticker });
        }

        let series = self.random_walk(&ticker, period_days)?;
        debug!(
            "MockMarketDataProvider: generated {} bars for {}",
            series.len(),
            ticker
        );
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_last_value_predictor() {
        let input = Array3::from_shape_vec((2, 2, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let output = LastValuePredictor.predict(input.view()).unwrap();
        assert_eq!(output.shape(), &[2, 1]);
        assert_eq!(output[[0, 0]], 2.0);
        assert_eq!(output[[1, 0]], 4.0);
    }

    #[test]
    fn test_failing_predictor_counts_calls() {
        let predictor = FailingPredictor::after(1);
        let input = Array3::<f64>::zeros((1, 2, 1));
        assert!(predictor.predict(input.view()).is_ok());
        assert!(predictor.predict(input.view()).is_err());
        assert_eq!(predictor.calls(), 2);
    }

    #[tokio::test]
    async fn test_random_walk_is_deterministic_and_on_business_days() {
        let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(); // Sunday
        let provider = MockMarketDataProvider::new(7).with_end_date(end);

        let a = provider.fetch("msft", 365).await.unwrap();
        let b = provider.fetch("MSFT", 365).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.symbol(), "MSFT");
        assert_eq!(a.len(), 365 * 5 / 7);
        assert_eq!(a.last().unwrap().date(), NaiveDate::from_ymd_opt(2024, 6, 28).unwrap());
        assert!(
            a.bars()
                .iter()
                .all(|bar| !matches!(bar.date().weekday(), Weekday::Sat | Weekday::Sun))
        );
    }

    #[tokio::test]
    async fn test_fixed_series_mode() {
        let series = TimeSeries::new("AAPL", vec![]).unwrap();
        let provider = MockMarketDataProvider::default().with_series(series);

        assert!(provider.fetch("aapl", 30).await.unwrap().is_empty());
        assert!(matches!(
            provider.fetch("GOOG", 30).await,
            Err(MarketDataError::NotFound { .. })
        ));
        assert!(matches!(
            provider.fetch("  ", 30).await,
            Err(MarketDataError::InvalidTicker { .. })
        ));
    }
}
