//! fleet-watch - Live fleet map watcher
//!
//! Subscribes to the live fleet feed, reconciles every vehicle update and
//! prints the marker commands a map front-end would execute. Reconnects
//! forever until stopped with Ctrl+C, then prints the last-known fleet.

mod config;
mod output;

use anyhow::Result;
use clap::Parser;
use fleet_client::LiveSession;
use fleet_core::CommandRenderer;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{CliOverrides, Config};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "fleet-watch")]
#[command(author, version, about = "Live fleet map watcher")]
struct Cli {
    /// Origin of the page hosting the map (e.g. https://fleet.example.com)
    #[arg(long, env = "FLEET_ORIGIN")]
    origin: Option<String>,

    /// Feed WebSocket URL (overrides --origin)
    #[arg(long)]
    url: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "FLEET_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Seconds to wait before reconnecting
    #[arg(long, value_name = "SECS")]
    retry_delay: Option<u64>,

    /// Zoom level used to focus the first vehicle
    #[arg(long)]
    focus_zoom: Option<u8>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, stdout carries render commands
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    let merged = config.merge_with_args(&CliOverrides {
        origin: cli.origin.as_deref(),
        url: cli.url.as_deref(),
        output: cli.output,
        no_color: cli.no_color,
        retry_delay: cli.retry_delay,
        focus_zoom: cli.focus_zoom,
    });
    let url = merged.feed_url()?;

    let renderer = CommandRenderer::new(OutputContext::new(merged.output, merged.no_color));
    info!(
        %url,
        retry_delay = ?merged.retry_delay,
        "Watching live fleet feed, press Ctrl+C to stop"
    );

    let (connection, session) = LiveSession::connect(url, merged.session_config(), renderer);
    let store = session.run_until(shutdown_signal()).await;
    connection.close();

    info!(
        attempts = connection.attempts(),
        summary = %store.status_counts(),
        "Stopped watching"
    );
    store.renderer().sink().print_summary(&store);

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
