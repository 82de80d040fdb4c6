pub mod bootstrap;

// Recursive forecasting, confidence bands and backtests
pub mod forecasting;

// Scaling, windowing and predictor adapters
pub mod ml;
