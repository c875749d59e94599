//! Stats command - Show store statistics

use clap::Args;

use super::utils::{open_tree, print_json};
use super::OutputFormat;
use crate::config::Config;

/// Stats command arguments
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

/// Execute stats command
pub fn execute(args: StatsArgs, config: &Config) -> anyhow::Result<()> {
    let tree = open_tree(config)?;
    let stats = tree.stats();

    if args.format == OutputFormat::Json {
        return print_json(&stats);
    }

    println!("📊 Memory Tree Statistics\n");
    println!("  Nodes:           {}", stats.nodes);
    println!("  ├── Categories:  {}", stats.categories);
    println!("  └── Memories:    {}", stats.memories);
    println!("  Max depth:       {}", stats.max_depth);
    println!("  Total accesses:  {}", stats.total_accesses);
    println!("\n📁 Store: {}", config.store_path().display());

    Ok(())
}
