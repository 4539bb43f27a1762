mod auth;
mod config;
mod error;
mod logging;
mod models;
mod routes;

use anyhow::Context;
use clap::Parser;
use routes::AppState;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};
use tracing::info;

/// ----------------------------------------------------------------------
/// 1  Command line
/// ----------------------------------------------------------------------
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// JSON config with a `selector` and one profile per environment
    #[arg(short, long, env = "HELPDESK_BRIDGE_CONFIG", default_value = "config_api.json")]
    config: PathBuf,

    /// Address to listen on
    #[arg(long, env = "HELPDESK_BRIDGE_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port (default 8001)
    #[arg(short, long, env = "HELPDESK_BRIDGE_PORT", default_value_t = 8001)]
    port: u16,

    /// Append log lines to this file instead of stdout
    #[arg(long, env = "HELPDESK_BRIDGE_LOG_FILE")]
    log_file: Option<PathBuf>,
}

/// ----------------------------------------------------------------------
/// 2  Startup
/// ----------------------------------------------------------------------
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // a) Logging
    logging::init(cli.log_file.as_deref())?;

    // b) Config and shared state
    let config = config::load(&cli.config)?;
    let state = Arc::new(AppState::from_config(&config)?);

    // c) Router
    let app = routes::router(state);

    // d) Server
    let addr = SocketAddr::new(cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Listening on http://{addr}/ticketRequests");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
