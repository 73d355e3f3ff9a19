use clap::Parser;
use dotenvy::dotenv;
use log::*;

use crate::{cli::Arguments, config::EngineConfig};

mod cli;
mod commands;
mod config;
mod formatting;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let args = Arguments::parse();
    let config = EngineConfig::from_env_or_default();
    trace!("🪛️ Configuration loaded: {config:?}");
    if let Err(e) = commands::run(args.command, config).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
