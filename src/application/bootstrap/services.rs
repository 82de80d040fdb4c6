use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::application::bootstrap::model::ModelBootstrap;
use crate::application::bootstrap::persistence::PersistenceBootstrap;
use crate::application::forecasting::service::ForecastingService;
use crate::config::{Config, DataSource};
use crate::domain::ports::MarketDataProvider;
use crate::infrastructure::csv_market_data::CsvMarketDataProvider;
use crate::infrastructure::mock::MockMarketDataProvider;

pub struct ServicesBootstrap;

impl ServicesBootstrap {
    pub fn init(config: Config) -> Result<ForecastingService> {
        // 1. Market data
        let market_data = Self::market_data(&config);

        // 2. Model and scaler
        let predictor = ModelBootstrap::init(&config)?;
        let scaler = PersistenceBootstrap::init(&config)?;
        let residuals = PersistenceBootstrap::residuals(&config)?;

        // 3. Service
        let mut service =
            ForecastingService::new(config, market_data, predictor).with_residuals(residuals);
        if let Some(scaler) = scaler {
            service = service.with_scaler(scaler);
        }
        Ok(service)
    }

    pub fn market_data(config: &Config) -> Arc<dyn MarketDataProvider> {
        match config.data.source {
            DataSource::Csv => {
                info!("Market data: CSV files in {:?}", config.data.data_dir);
                Arc::new(CsvMarketDataProvider::new(&config.data.data_dir))
            }
            DataSource::Mock => {
                info!("Market data: mock random walk");
                Arc::new(MockMarketDataProvider::default())
            }
        }
    }
}
