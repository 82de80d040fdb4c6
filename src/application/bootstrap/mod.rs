pub mod model;
pub mod persistence;
pub mod services;
