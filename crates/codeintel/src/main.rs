//! Entry point: parses CLI args, loads configuration, and starts the HTTP
//! server wiring the storage, indexing, embedding, and query crates
//! together.

mod config;
mod server;

use clap::Parser;
use codeintel_config::validation::Validate;
use codeintel_config::ApplicationConfig;
use config::Args;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    codeintel_common::init::initialize_environment();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let args = Args::parse();
    let app_config = config::apply_overrides(ApplicationConfig::from_env(), &args);
    app_config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    server::run(app_config, args).await
}
