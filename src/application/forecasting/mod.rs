pub mod calendar;
pub mod confidence;
pub mod metrics_evaluator;
pub mod recursive_forecaster;
pub mod service;
