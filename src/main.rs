//! Solarfeed server - main entry point
//!
//! Runs one feed aggregator per built-in domain plus the forecast poller and
//! serves the aggregated views over HTTP for the dashboard front-end.

use solarfeed::{
    aggregator::FeedAggregator,
    client::{BackfillClient, WebSocketChannel},
    forecast::ForecastService,
    http::{self, AppState},
    schema::DomainSchema,
    FeedConfig, Result,
};

use clap::Parser;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Command line arguments
#[derive(Parser)]
#[command(name = "solarfeed-server")]
#[command(about = "Telemetry feed aggregator for the solar plant dashboard")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file; environment variables are used
    /// when omitted
    #[arg(short, long, env = "SOLARFEED_CONFIG")]
    config: Option<PathBuf>,

    /// Override the HTTP bind address
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = solarfeed::logging::LogConfig::from_env();
    let _log_guard = match solarfeed::logging::init_logging(log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            std::process::exit(1);
        }
    };

    let config_result = match &cli.config {
        Some(path) => FeedConfig::from_file(path),
        None => FeedConfig::from_env(),
    };
    let mut config = match config_result {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Some(bind) = cli.bind {
        config.http.bind = bind;
    }

    info!("Starting solarfeed server");

    let channel = Arc::new(WebSocketChannel::new(config.live.clone()));
    channel.connect().await?;

    let backfill = Arc::new(BackfillClient::new(&config.server)?);

    let mut feeds = HashMap::new();
    for schema in DomainSchema::all_builtin() {
        let feed = FeedAggregator::new(
            schema.clone(),
            channel.clone(),
            backfill.clone(),
            config.buffer.capacity,
        );
        feed.initialize().await?;
        feeds.insert(schema.domain, feed);
    }

    let forecast = ForecastService::new(&config.server, config.forecast.clone())?;
    forecast.start().await;

    let state = AppState {
        feeds: Arc::new(feeds),
        forecast: forecast.clone(),
    };

    let bind = config.http.bind;
    tokio::select! {
        result = http::serve(bind, state.clone()) => {
            if let Err(e) = result {
                error!("HTTP server exited: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    for feed in state.feeds.values() {
        feed.teardown().await;
    }
    forecast.stop().await;
    channel.close().await;

    info!("Solarfeed server stopped");
    Ok(())
}
