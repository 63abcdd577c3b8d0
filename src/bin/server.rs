//! ModelSwapper API server.
//!
//! Boots the selection engine with in-memory stores, seeds the stock
//! catalog, and serves the REST surface. Run with: cargo run --bin server

use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use model_swapper::api::{SwapperApiConfig, SwapperApiServer};
use model_swapper::catalog::seed_defaults;
use model_swapper::{CredentialCipher, ModelSwapper, SwapperConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "model-swapper-server")]
#[command(about = "ModelSwapper API server - model selection and cost control")]
#[command(version)]
struct Cli {
    /// Address to bind
    #[arg(long, env = "MODEL_SWAPPER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "MODEL_SWAPPER_PORT", default_value_t = 3000)]
    port: u16,

    /// Disable CORS (enabled by default for browser-based callers)
    #[arg(long)]
    no_cors: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env before reading any configuration
    if let Err(e) = dotenv() {
        eprintln!("note: no .env file loaded ({})", e);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = SwapperConfig::from_env();
    info!(
        emergency_ceiling = config.emergency_daily_ceiling_usd,
        "starting ModelSwapper"
    );

    let swapper = ModelSwapper::builder()
        .with_config(config)
        .with_cipher(CredentialCipher::from_env()?)
        .build()?;
    seed_defaults(swapper.catalog().as_ref()).await?;

    let api_config = SwapperApiConfig {
        host: cli.host,
        port: cli.port,
        cors_enabled: !cli.no_cors,
        ..SwapperApiConfig::default()
    };
    SwapperApiServer::new(api_config, Arc::new(swapper))
        .serve()
        .await
}
