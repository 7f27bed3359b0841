//! buslive — live bus position relay.
//!
//! Entry point for the relay server.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line options. Configuration files and environment variables cover
/// everything else; these are just the common overrides.
#[derive(Debug, Parser)]
#[command(name = "buslive", version, about = "Live bus position relay")]
struct Cli {
    /// Bind host (overrides configuration)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides configuration)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "buslive=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = buslive::server::load_config()?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    info!("Starting buslive relay v{}", env!("CARGO_PKG_VERSION"));
    buslive::server::run(config).await
}
