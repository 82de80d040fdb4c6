use crate::domain::errors::ForecastError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// One daily OHLC bar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Bar {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(0.0)
    }
}

/// Chronologically ordered bars for a single ticker.
///
/// Timestamps are strictly increasing; construction rejects anything else.
/// The series is read-only once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl TimeSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, ForecastError> {
        if let Some(pos) = bars
            .windows(2)
            .position(|pair| pair[1].timestamp <= pair[0].timestamp)
        {
            return Err(ForecastError::InvalidSeries {
                reason: format!(
                    "timestamps must be strictly increasing (bar {} at {} follows {})",
                    pos + 1,
                    bars[pos + 1].timestamp,
                    bars[pos].timestamp
                ),
            });
        }

        Ok(Self {
            symbol: symbol.into(),
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(Bar::close_f64).collect()
    }

    /// Splits into (train, test) with the test block at the tail.
    ///
    /// The split index is `floor(len * (1 - test_fraction))`; no shuffling.
    pub fn split_tail(&self, test_fraction: f64) -> Result<(TimeSeries, TimeSeries), ForecastError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(ForecastError::InvalidTestFraction {
                fraction: test_fraction,
            });
        }
        if self.bars.is_empty() {
            return Err(ForecastError::EmptySeries);
        }

        let split_idx = (self.bars.len() as f64 * (1.0 - test_fraction)).floor() as usize;
        let (train, test) = self.bars.split_at(split_idx);

        Ok((
            TimeSeries {
                symbol: self.symbol.clone(),
                bars: train.to_vec(),
            },
            TimeSeries {
                symbol: self.symbol.clone(),
                bars: test.to_vec(),
            },
        ))
    }
}

/// Simple close-to-close returns. Steps from a zero close are skipped.
pub fn simple_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|pair| pair[0] != 0.0)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect()
}

/// Log returns. Steps involving a non-positive close are skipped.
pub fn log_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|pair| pair[0] > 0.0 && pair[1] > 0.0)
        .map(|pair| (pair[1] / pair[0]).ln())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn bar(day: i64, close: Decimal) -> Bar {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day);
        Bar {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
        }
    }

    #[test]
    fn test_rejects_duplicate_timestamps() {
        let bars = vec![bar(0, dec!(10)), bar(1, dec!(11)), bar(1, dec!(12))];
        let result = TimeSeries::new("AAPL", bars);
        assert!(matches!(result, Err(ForecastError::InvalidSeries { .. })));
    }

    #[test]
    fn test_rejects_out_of_order_timestamps() {
        let bars = vec![bar(2, dec!(10)), bar(1, dec!(11))];
        assert!(TimeSeries::new("AAPL", bars).is_err());
    }

    #[test]
    fn test_split_tail_preserves_order() {
        let bars: Vec<Bar> = (0..10).map(|i| bar(i, Decimal::from(i))).collect();
        let series = TimeSeries::new("AAPL", bars).unwrap();

        let (train, test) = series.split_tail(0.2).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);
        assert_eq!(test.closes(), vec![8.0, 9.0]);
        assert!(train.last().unwrap().timestamp < test.bars()[0].timestamp);
    }

    #[test]
    fn test_split_tail_rejects_bad_fraction() {
        let series = TimeSeries::new("AAPL", vec![bar(0, dec!(1))]).unwrap();
        assert!(series.split_tail(0.0).is_err());
        assert!(series.split_tail(1.0).is_err());
        assert!(series.split_tail(f64::NAN).is_err());
    }

    #[test]
    fn test_returns_skip_zero_close() {
        let returns = simple_returns(&[0.0, 10.0, 11.0]);
        assert_eq!(returns.len(), 1);
        assert!((returns[0] - 0.1).abs() < 1e-12);

        let logs = log_returns(&[0.0, 10.0, 10.0]);
        assert_eq!(logs, vec![0.0]);
    }
}
