mod analytics;
mod auth;
mod cache;
mod cli;
mod config;
mod error;
mod insights;
mod output;
mod providers;
mod server;
mod service;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting repopulse");
    cli.execute().await?;

    Ok(())
}
