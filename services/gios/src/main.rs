//! GIOŚ CLI
//!
//! Command-line interface for the GIOŚ air-quality service.

use std::path::PathBuf;

use clap::Parser;
use gios::{load_config, Config, GiosBuilder};
use tokio_util::sync::CancellationToken;
use tracing::Level;

#[derive(Parser)]
#[command(name = "gios")]
#[command(about = "Air-quality sensors for a GIOŚ monitoring station")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Station id (overrides config file)
    #[arg(short, long)]
    station_id: Option<u32>,

    /// Dashboard port (overrides config file)
    #[arg(long)]
    dashboard_port: Option<u16>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, station_id={:?}, dashboard_port={:?}, log_level={:?}",
        args.config,
        args.station_id,
        args.dashboard_port,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(station_id) = args.station_id {
        config.station.station_id = station_id;
    }
    if let Some(dashboard_port) = args.dashboard_port {
        config.dashboard.port = dashboard_port;
    }

    tracing::info!(
        "Starting GIOŚ service for station {}",
        config.station.station_id
    );
    tracing::debug!(
        "Polling every {}s from {}",
        config.station.polling_interval_seconds,
        config.api.base_url
    );

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        cancel_for_signal.cancel();
    });

    GiosBuilder::new(config)
        .with_cancellation_token(cancel)
        .build()
        .await?
        .start()
        .await?;

    Ok(())
}
