use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::sync::Arc;
use std::time::Duration;
use stockcast::application::forecasting::calendar::add_business_days;
use stockcast::application::forecasting::service::ForecastingService;
use stockcast::application::ml::predictor::SequencePredictor;
use stockcast::application::ml::scaler::ScalingModel;
use stockcast::config::Config;
use stockcast::domain::errors::{ForecastError, PredictorError};
use stockcast::domain::forecast::SigmaEstimate;
use stockcast::domain::market::time_series::{Bar, TimeSeries};
use stockcast::infrastructure::mock::{
    FailingPredictor, LastValuePredictor, MockMarketDataProvider, SlowPredictor,
};

fn business_day_series(symbol: &str, closes: &[f64]) -> TimeSeries {
    // 2024-01-01 is a Monday
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            let price = Decimal::from_f64(*close).unwrap();
            Bar {
                timestamp: add_business_days(start, i)
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
                    .and_utc(),
                open: price,
                high: price,
                low: price,
                close: price,
            }
        })
        .collect();
    TimeSeries::new(symbol, bars).unwrap()
}

fn wavy_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.1)
        .collect()
}

fn service_with(
    predictor: Arc<dyn SequencePredictor>,
    series: TimeSeries,
) -> ForecastingService {
    let mut config = Config::default();
    config.forecast.window_size = 5;
    let provider = MockMarketDataProvider::default().with_series(series);
    ForecastingService::new(config, Arc::new(provider), Some(predictor))
}

#[tokio::test]
async fn test_multi_day_forecast_shape_and_dates() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();

    let series = business_day_series("AAPL", &wavy_closes(60));
    let last_date = series.last().unwrap().date();
    let last_close = series.last().unwrap().close_f64();
    let service = service_with(Arc::new(LastValuePredictor), series);

    let forecast = service.forecast_multi_day("AAPL", 7, None).await?;
    assert_eq!(forecast.horizon, 7);
    assert_eq!(forecast.path.len(), 7);

    let steps: Vec<usize> = forecast.path.steps.iter().map(|p| p.step).collect();
    assert_eq!(steps, (1..=7).collect::<Vec<_>>());

    let mut previous = last_date;
    for prediction in &forecast.path.steps {
        assert!(prediction.date > previous);
        assert!(!matches!(prediction.date.weekday(), Weekday::Sat | Weekday::Sun));
        previous = prediction.date;

        // Persistence fed back into itself stays flat
        assert!((prediction.close - last_close).abs() < 1e-6);
        assert!(prediction.interval.lower <= prediction.close);
        assert!(prediction.interval.upper >= prediction.close);
    }

    let widths: Vec<f64> = forecast
        .path
        .steps
        .iter()
        .map(|p| p.interval.half_width)
        .collect();
    assert!(widths.windows(2).all(|w| w[1] >= w[0]));
    assert!(matches!(forecast.sigma, SigmaEstimate::VolatilityProxy(_)));
    assert!(forecast.summary.net_change.abs() < 1e-6);
    Ok(())
}

#[tokio::test]
async fn test_horizon_is_clamped_not_rejected() -> anyhow::Result<()> {
    let series = business_day_series("AAPL", &wavy_closes(40));
    let service = service_with(Arc::new(LastValuePredictor), series);

    let short = service.forecast_multi_day("AAPL", 0, None).await?;
    assert_eq!(short.path.len(), 1);

    let long = service.forecast_multi_day("AAPL", 500, None).await?;
    assert_eq!(long.horizon, 30);
    assert_eq!(long.path.len(), 30);
    Ok(())
}

#[tokio::test]
async fn test_next_day_reports_change_against_latest_close() -> anyhow::Result<()> {
    let series = business_day_series("MSFT", &[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
    let service = service_with(Arc::new(LastValuePredictor), series);

    let result = service.predict_next_day("msft", None).await?;
    assert_eq!(result.ticker, "MSFT");
    assert_eq!(result.latest_close, 16.0);
    assert!((result.prediction.close - 16.0).abs() < 1e-9);
    assert!(result.change.abs() < 1e-9);
    assert_eq!(result.change_percent.map(|p| p.abs() < 1e-9), Some(true));
    assert_eq!(
        result.prediction.date,
        add_business_days(result.latest_date, 1)
    );
    Ok(())
}

#[tokio::test]
async fn test_failure_mid_forecast_discards_path() {
    let series = business_day_series("AAPL", &wavy_closes(40));
    let service = service_with(Arc::new(FailingPredictor::after(2)), series);

    let result = service.forecast_multi_day("AAPL", 5, None).await;
    assert!(matches!(
        result,
        Err(ForecastError::Predictor(PredictorError::Inference { .. }))
    ));
}

#[tokio::test]
async fn test_slow_predictor_times_out() {
    let mut config = Config::default();
    config.forecast.window_size = 5;
    config.model.predictor_timeout = Duration::from_millis(20);
    let provider = MockMarketDataProvider::default()
        .with_series(business_day_series("AAPL", &wavy_closes(40)));
    let service = ForecastingService::new(
        config,
        Arc::new(provider),
        Some(Arc::new(SlowPredictor::new(Duration::from_millis(500)))),
    );

    let result = service.predict_next_day("AAPL", None).await;
    assert!(matches!(
        result,
        Err(ForecastError::Predictor(PredictorError::Timeout { timeout_ms: 20 }))
    ));
}

#[tokio::test]
async fn test_shared_scaler_is_used_read_only() -> anyhow::Result<()> {
    let series = business_day_series("AAPL", &[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
    let scaler = Arc::new(ScalingModel::from_params(vec![0.0], vec![100.0])?);
    let service =
        service_with(Arc::new(LastValuePredictor), series).with_scaler(Arc::clone(&scaler));

    let (a, b) = tokio::join!(
        service.predict_next_day("AAPL", None),
        service.forecast_multi_day("AAPL", 3, None)
    );
    assert!((a?.prediction.close - 15.0).abs() < 1e-9);
    assert_eq!(b?.path.closes().len(), 3);
    assert_eq!(scaler.data_max(), &[100.0]);
    Ok(())
}

#[tokio::test]
async fn test_random_walk_provider_feeds_default_window() -> anyhow::Result<()> {
    let provider = MockMarketDataProvider::new(11)
        .with_end_date(NaiveDate::from_ymd_opt(2024, 6, 28).unwrap());
    let service = ForecastingService::new(
        Config::default(),
        Arc::new(provider),
        Some(Arc::new(LastValuePredictor)),
    );

    // window 100 + 100 extra calendar days of history
    let forecast = service.forecast_multi_day("GOOG", 5, None).await?;
    assert_eq!(forecast.path.len(), 5);
    assert!(forecast.sigma.value() > 0.0);
    Ok(())
}
