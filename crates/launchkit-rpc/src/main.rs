//! Launchkit RPC Server - JSON-RPC host for the launcher plugins.
//!
//! The launcher front end talks to this process over HTTP: it forwards each
//! keystroke as a `query`, executes picked actions through `action` and edits
//! settings through `get_config` / `set_config`.

mod handlers;
mod queries;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use launchkit_core::config::{AppConfig, PathsConfig};
use launchkit_core::{Desktop, JsonConfigStore, SystemDesktop};
use launchkit_plugins::{build_plugins, PluginContext};
use server::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "launchkit-rpc")]
#[command(about = "JSON-RPC host for launchkit plugins")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Directory for settings, caches and lookup tables
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(AppConfig::APP_NAME))
        .or_else(|| std::env::current_dir().ok().map(|dir| dir.join(AppConfig::APP_NAME)))
        .context("No data directory available; pass --data-dir")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Launchkit RPC Server");

    let data_dir = match args.data_dir {
        Some(path) => path,
        None => default_data_dir()?,
    };
    info!("Data directory: {}", data_dir.display());

    let desktop: Arc<dyn Desktop> = Arc::new(SystemDesktop::new());
    let config = Arc::new(JsonConfigStore::new(
        data_dir.join(PathsConfig::CONFIG_DIR_NAME),
    ));
    let ctx = PluginContext::new(&data_dir, config, desktop.clone());
    let plugins = build_plugins(&ctx)?;

    let state = Arc::new(AppState::new(plugins, desktop));
    let addr = server::start_server(state.clone(), &args.host, args.port).await?;

    // Read by the launcher front end; keep the format stable.
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping plugins");
    state.shutdown().await;

    Ok(())
}
