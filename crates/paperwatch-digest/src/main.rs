//! paperwatch — Daily preprint digest.
//! Entry point for the digest binary.

mod cli;
mod config;
mod pipeline;
mod summary;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("paperwatch=info,warn")),
        )
        .init();

    let args = cli::Args::parse();

    info!("paperwatch starting up...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match config::Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Could not load configuration: {e}");
            std::process::exit(2);
        }
    };

    let target_date = args.date.unwrap_or_else(|| Utc::now().date_naive());
    let days_back = args.days_back.unwrap_or(config.run.days_back);

    match pipeline::run(&config, target_date, days_back, args.force).await {
        Ok(_summary) => {}
        Err(e) => {
            error!("Run failed: {e}");
            std::process::exit(1);
        }
    }
}
