// Domain-specific error types
pub mod errors;

// Forecast outputs and backtest reports
pub mod forecast;

// Market data domain
pub mod market;

// Model input contract
pub mod ml;

// Port interfaces
pub mod ports;
