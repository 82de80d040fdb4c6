//! Market data provider reading daily bars from `<DATA_DIR>/<TICKER>.csv`.
//!
//! Expected header: `date,open,high,low,close` (extra columns are ignored).
//! Rows may be in any order; they are sorted by date on load.

use crate::domain::errors::MarketDataError;
use crate::domain::market::time_series::{Bar, TimeSeries};
use crate::domain::ports::{MarketDataProvider, normalize_ticker};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, warn};

/// Days of slack added to the requested period so weekends and holidays
/// at the edge do not starve the window.
const PERIOD_SLACK_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
struct CsvBar {
    date: String,
    open: String,
    high: String,
    low: String,
    close: String,
}

pub struct CsvMarketDataProvider {
    data_dir: PathBuf,
}

impl CsvMarketDataProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn parse(ticker: &str, content: &str) -> Result<Vec<Bar>, MarketDataError> {
        let parse_error = |reason: String| MarketDataError::Parse {
            ticker: ticker.to_string(),
            reason,
        };

        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for (line, result) in reader.deserialize::<CsvBar>().enumerate() {
            let row = result.map_err(|e| parse_error(e.to_string()))?;

            let date = NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d")
                .map_err(|e| parse_error(format!("row {}: bad date '{}': {}", line + 1, row.date, e)))?;
            let price = |field: &str, raw: &str| {
                Decimal::from_str(raw.trim())
                    .map_err(|e| parse_error(format!("row {}: bad {} '{}': {}", line + 1, field, raw, e)))
            };

            bars.push(Bar {
                timestamp: date
                    .and_hms_opt(0, 0, 0)
                    .ok_or_else(|| parse_error(format!("row {}: invalid date", line + 1)))?
                    .and_utc(),
                open: price("open", &row.open)?,
                high: price("high", &row.high)?,
                low: price("low", &row.low)?,
                close: price("close", &row.close)?,
            });
        }

        bars.sort_by_key(|bar| bar.timestamp);
        Ok(bars)
    }
}

#[async_trait]
impl MarketDataProvider for CsvMarketDataProvider {
    async fn fetch(&self, ticker: &str, period_days: u32) -> Result<TimeSeries, MarketDataError> {
        let ticker = normalize_ticker(ticker)?;
        let path = self.data_dir.join(format!("{}.csv", ticker));

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("No data file for {} at {:?}", ticker, path);
                return Err(MarketDataError::NotFound { ticker });
            }
            Err(e) => {
                return Err(MarketDataError::Io {
                    ticker,
                    reason: e.to_string(),
                });
            }
        };

        let mut bars = Self::parse(&ticker, &content)?;
        let Some(last) = bars.last().map(|bar| bar.timestamp) else {
            return Err(MarketDataError::NoData { ticker });
        };

        let cutoff = last - Duration::days(period_days as i64 + PERIOD_SLACK_DAYS);
        bars.retain(|bar| bar.timestamp >= cutoff);

        debug!("Loaded {} bars for {} from {:?}", bars.len(), ticker, path);
        TimeSeries::new(ticker.clone(), bars).map_err(|e| MarketDataError::Parse {
            ticker,
            reason: e.to_string(),
        })
    }
}
