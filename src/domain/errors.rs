use thiserror::Error;

/// Errors raised by the forecasting pipeline.
///
/// Every variant carries enough context to be rendered as a user-facing
/// message at the API boundary.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Time series is empty")]
    EmptySeries,

    #[error("Invalid time series: {reason}")]
    InvalidSeries { reason: String },

    #[error("Insufficient data: need at least {required} rows, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Insufficient test data: need at least {required} test sequences, got {available}")]
    InsufficientTestData { required: usize, available: usize },

    #[error("Window size must be at least 1")]
    InvalidWindowSize,

    #[error("Malformed feature set: {reason}")]
    MalformedFeatureSet { reason: String },

    #[error("Dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid scaling parameters: {reason}")]
    InvalidScaler { reason: String },

    #[error("Scaler was fitted on features {stored:?}, but {expected:?} were requested")]
    ScalerMismatch {
        stored: Vec<String>,
        expected: Vec<String>,
    },

    #[error("Test fraction must be strictly between 0 and 1, got {fraction}")]
    InvalidTestFraction { fraction: f64 },

    #[error("Forecasting model is not loaded")]
    ModelUnavailable,

    #[error("Predictor failed: {0}")]
    Predictor(#[from] PredictorError),

    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    #[error("Forecast task failed: {reason}")]
    TaskFailed { reason: String },
}

/// Errors raised by the opaque sequence predictor.
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("Failed to load model from {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("Inference failed: {reason}")]
    Inference { reason: String },

    #[error("Unexpected output shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Predictor call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Predictor worker terminated without a result")]
    Disconnected,
}

/// Errors surfaced by market data providers.
///
/// These propagate to the caller unchanged; the pipeline never retries them.
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("Invalid ticker format: '{ticker}'")]
    InvalidTicker { ticker: String },

    #[error("Ticker not found: {ticker}")]
    NotFound { ticker: String },

    #[error("No data found for ticker: {ticker}")]
    NoData { ticker: String },

    #[error("Failed to read market data for {ticker}: {reason}")]
    Io { ticker: String, reason: String },

    #[error("Failed to parse market data for {ticker}: {reason}")]
    Parse { ticker: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_formatting() {
        let error = ForecastError::InsufficientData {
            required: 101,
            available: 42,
        };

        let msg = error.to_string();
        assert!(msg.contains("101"));
        assert!(msg.contains("42"));
    }

    #[test]
    fn test_market_data_error_is_transparent() {
        let error: ForecastError = MarketDataError::NoData {
            ticker: "ZZZZ".to_string(),
        }
        .into();

        assert_eq!(error.to_string(), "No data found for ticker: ZZZZ");
    }

    #[test]
    fn test_predictor_timeout_formatting() {
        let error: ForecastError = PredictorError::Timeout { timeout_ms: 250 }.into();
        assert!(error.to_string().contains("250ms"));
    }
}
