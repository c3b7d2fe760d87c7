//! chartkeepd: Chartkeep daemon.
//!
//! Serves cached chart data over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use chartkeep::server::config::{Config, Secrets};
use chartkeep::{ChartkeepError, server, version};

/// Chartkeep daemon, a caching proxy for music chart data.
#[derive(Parser)]
#[command(name = "chartkeepd")]
#[command(version = version::PKG_VERSION)]
#[command(about = "Chartkeep chart caching daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "CHARTKEEP_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Override the bind address from the config file.
    #[arg(short, long)]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chartkeep=info,chartkeepd=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;
    let handler = config.handler_builder(&secrets)?.build()?;

    let address = args.address.unwrap_or_else(|| config.server.address.clone());
    let addr: SocketAddr = address
        .parse()
        .map_err(|e| ChartkeepError::Configuration(format!("Invalid address {address:?}: {e}")))?;

    info!(
        version = version::version_string(),
        %addr,
        enrichment = handler.has_catalog(),
        refresh_day = %handler.engine().policy().refresh_day,
        "chartkeepd starting"
    );

    let app = server::router(Arc::new(handler));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("chartkeepd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
