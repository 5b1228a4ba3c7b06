//! Command-line arguments and the overlay onto [`ApplicationConfig`].

use clap::Parser;
use codeintel_config::ApplicationConfig;

/// A thin HTTP front end wiring the storage pool, indexing pipeline,
/// embedding job worker, and query orchestrator together.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to bind the HTTP server to, overriding `api.host`/`api.port`
    #[arg(long)]
    pub bind: Option<String>,

    /// Run pending database migrations before serving
    #[arg(long, default_value_t = false)]
    pub migrate: bool,

    /// Skip starting the background embedding job worker
    #[arg(long, default_value_t = false)]
    pub no_embedding_worker: bool,
}

/// Applies CLI overrides onto an environment-sourced [`ApplicationConfig`].
pub fn apply_overrides(mut config: ApplicationConfig, args: &Args) -> ApplicationConfig {
    if let Some(bind) = &args.bind {
        if let Some((host, port)) = bind.rsplit_once(':') {
            if let Ok(port) = port.parse() {
                config.api.host = host.to_string();
                config.api.port = port;
            }
        }
    }
    config
}
