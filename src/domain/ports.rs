use crate::domain::errors::MarketDataError;
use crate::domain::market::time_series::TimeSeries;
use async_trait::async_trait;

/// Source of historical daily bars.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetches roughly `period_days` calendar days of history ending at the
    /// most recent available bar.
    async fn fetch(&self, ticker: &str, period_days: u32) -> Result<TimeSeries, MarketDataError>;
}

/// Trims and upper-cases a ticker, rejecting empty or overlong symbols.
///
/// Only `A-Z`, `0-9`, `.`, `^` and `-` are allowed, so a ticker is always a
/// plain file stem.
pub fn normalize_ticker(ticker: &str) -> Result<String, MarketDataError> {
    let normalized = ticker.trim().to_uppercase();
    let valid_chars = normalized
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '^' | '-'));
    let valid_length = !normalized.is_empty() && normalized.len() <= 10;
    if !valid_length || !valid_chars || normalized.starts_with('.') {
        return Err(MarketDataError::InvalidTicker {
            ticker: ticker.to_string(),
        });
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ticker() {
        assert_eq!(normalize_ticker(" aapl ").unwrap(), "AAPL");
        assert!(normalize_ticker("   ").is_err());
        assert!(normalize_ticker("ABCDEFGHIJK").is_err());
    }

    #[test]
    fn test_ticker_cannot_leave_data_dir() {
        assert_eq!(normalize_ticker("brk.b").unwrap(), "BRK.B");
        assert_eq!(normalize_ticker("^gspc").unwrap(), "^GSPC");
        assert_eq!(normalize_ticker("rds-a").unwrap(), "RDS-A");

        for ticker in ["../X", "..", "A/B", "A\\B", "A B", "A:B", ".HIDDEN"] {
            assert!(
                matches!(
                    normalize_ticker(ticker),
                    Err(MarketDataError::InvalidTicker { .. })
                ),
                "{} accepted",
                ticker
            );
        }
    }
}
