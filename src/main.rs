//! memtree CLI - Entry point
//!
//! Usage: memtree <command> [options]

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use memtree::cli::{Cli, Commands};
use memtree::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing; --verbose wins over RUST_LOG
    let filter = if cli.verbose {
        EnvFilter::new("memtree=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    run(cli.command, cli.config.as_deref()).await
}

async fn run(command: Commands, config_path: Option<&Path>) -> Result<()> {
    // Loaded lazily: init runs before any config exists
    let config = || Config::resolve(config_path);

    match command {
        Commands::Init(args) => memtree::cli::init::run(args),
        Commands::Mkcat(args) => memtree::cli::add::run_mkcat(args, &config()?),
        Commands::Add(args) => memtree::cli::add::run_add(args, &config()?),
        Commands::Store(args) => memtree::cli::add::run_store(args, &config()?),
        Commands::Get(args) => memtree::cli::search::run_get(args, &config()?),
        Commands::Search(args) => memtree::cli::search::run_search(args, &config()?),
        Commands::Match(args) => memtree::cli::search::run_match(args, &config()?),
        Commands::Ask(args) => memtree::cli::search::run_ask(args, &config()?).await,
        Commands::Categories(args) => memtree::cli::browse::run_categories(args, &config()?),
        Commands::Flat(args) => memtree::cli::browse::run_flat(args, &config()?),
        Commands::Tree(args) => memtree::cli::browse::run_tree(args, &config()?),
        Commands::Stats(args) => memtree::cli::stats::execute(args, &config()?),
        Commands::Remember(args) => memtree::cli::remember::run(args, &config()?).await,
    }
}
