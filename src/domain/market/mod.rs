// Daily bars and series
pub mod time_series;
