use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use testdeck_web::{AppState, WebConfig, WebServer};

#[derive(Parser)]
#[command(name = "testdeck-web")]
#[command(about = "Testdeck API server - test cases, fixtures and Playwright runs")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TESTDECK_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// SQLite database file
    #[arg(long)]
    database: Option<PathBuf>,

    /// Disable authentication; every request acts as a local admin
    #[arg(long)]
    no_auth: bool,

    /// Write the effective configuration to the config path and exit
    #[arg(long)]
    write_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    info!("Testdeck API v{}", env!("CARGO_PKG_VERSION"));

    let config_path = cli
        .config
        .unwrap_or_else(|| testdeck_common::default_store_path().join("web.toml"));
    let mut config = WebConfig::load(&config_path)?;
    config.apply_env()?;
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    if cli.no_auth {
        config.auth.enabled = false;
    }
    config.validate()?;

    if cli.write_config {
        config.save(&config_path)?;
        info!("Wrote configuration to {}", config_path.display());
        return Ok(());
    }

    let addr = config.listen;
    let state = AppState::from_config(config)?;
    WebServer::new(state).serve(addr).await
}
