use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

mod cli;
mod config;
mod drm;
mod error;
mod media;
mod service;
mod util;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; everything can come from flags.
    dotenvy::dotenv().ok();

    let args = cli::Args::parse();
    init_logging(args.verbose);
    args.run().await
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("vidrip=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
