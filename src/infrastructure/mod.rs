pub mod csv_market_data;
pub mod mock;
pub mod model_manifest;
pub mod residual_persistence;
pub mod scaler_persistence;
