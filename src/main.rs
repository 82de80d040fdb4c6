//! Stockcast - closing-price forecasting from the command line
//!
//! Results are printed to stdout as JSON; logs go to stderr.
//!
//! # Usage
//! ```sh
//! stockcast predict AAPL
//! stockcast forecast AAPL --horizon 10
//! stockcast evaluate AAPL --test-fraction 0.2
//! stockcast describe
//! stockcast fit-scaler AAPL MSFT GOOG --period-days 1825
//! ```
//!
//! Configuration comes from the environment (and `.env`), see `Config::from_env`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use stockcast::application::bootstrap::services::ServicesBootstrap;
use stockcast::config::{Config, DataSource, ScalerMode};
use stockcast::infrastructure::residual_persistence::{ResidualRecord, ResidualStore};
use stockcast::infrastructure::scaler_persistence::ScalerStore;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Read bars from this directory (overrides DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use generated random-walk data instead of CSV files
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict the next business day's close
    Predict { ticker: String },

    /// Forecast several business days ahead
    Forecast {
        ticker: String,
        /// Number of days (clamped to MAX_FORECAST_HORIZON)
        #[arg(long)]
        horizon: Option<usize>,
    },

    /// Backtest the model on held-out history
    Evaluate {
        ticker: String,
        #[arg(long)]
        test_fraction: Option<f64>,
    },

    /// Show model status and input contract
    Describe,

    /// Fit a scaler over one or more tickers and save it to SCALER_PATH
    FitScaler {
        #[arg(required = true)]
        tickers: Vec<String>,
        #[arg(long, default_value_t = 1825)]
        period_days: u32,
    },
}

fn init_logging(json: bool) {
    let filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize result")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.json);
    info!("Stockcast {} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data.data_dir = dir;
        config.data.source = DataSource::Csv;
    }
    if cli.mock {
        config.data.source = DataSource::Mock;
    }
    if matches!(cli.command, Command::FitScaler { .. }) {
        // The scaler being fitted may not exist yet
        config.model.scaler_mode = ScalerMode::FitPerRequest;
    }
    let scaler_path = config.model.scaler_path.clone();
    let residuals_path = config.model.residuals_path.clone();
    let default_horizon = config.forecast.default_horizon;

    let service = ServicesBootstrap::init(config)?;

    match cli.command {
        Command::Predict { ticker } => {
            let prediction = service.predict_next_day(&ticker, None).await?;
            print_json(&prediction)?;
        }
        Command::Forecast { ticker, horizon } => {
            let forecast = service
                .forecast_multi_day(&ticker, horizon.unwrap_or(default_horizon), None)
                .await?;
            print_json(&forecast)?;
        }
        Command::Evaluate {
            ticker,
            test_fraction,
        } => {
            let report = service.evaluate(&ticker, test_fraction).await?;
            info!("{}", report.quality.description());
            ResidualStore::new(residuals_path)
                .record(&report.ticker, ResidualRecord::from_report(&report))?;
            print_json(&report)?;
        }
        Command::Describe => {
            print_json(&service.describe_model())?;
        }
        Command::FitScaler {
            tickers,
            period_days,
        } => {
            let artifact = service.fit_scaler(&tickers, period_days).await?;
            ScalerStore::new(scaler_path).save(&artifact)?;
            print_json(&artifact)?;
        }
    }

    Ok(())
}
