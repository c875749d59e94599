//! `memtree remember` command
//!
//! Asks the oracle whether the text is worth keeping, then where to file it.
//!
//! # Usage
//! ```bash
//! memtree remember "我叫张三，今年28岁"
//! memtree remember --force "下周去上海"   # Skip the retention check
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::utils::{open_agent, print_json};
use super::OutputFormat;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct RememberArgs {
    /// Text to remember
    pub text: String,

    /// Store without asking whether it is worth remembering
    #[arg(long)]
    pub force: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

pub async fn run(args: RememberArgs, config: &Config) -> Result<()> {
    let agent = open_agent(config)?;

    let placement = if args.force {
        Some(agent.classify_and_store(&args.text).await?)
    } else {
        agent.remember(&args.text).await?
    };

    if args.format == OutputFormat::Json {
        return print_json(&placement);
    }

    match placement {
        None => println!("{}", "Not worth remembering.".dimmed()),
        Some(placement) if placement.fallback => {
            println!(
                "{} Oracle unavailable, stored raw under root: {}",
                "!".yellow(),
                placement.label
            );
        }
        Some(placement) => {
            let path = agent
                .tree()
                .with_read(|tree| tree.display_path(&placement.parent_id))?;
            println!("{} Remembered under {}: {}", "✓".green(), path.cyan(), placement.label);
        }
    }
    Ok(())
}
