//! `memtree mkcat`, `memtree add` and `memtree store` commands
//!
//! # Usage
//! ```bash
//! memtree mkcat 人物                        # Category under the root
//! memtree mkcat 朋友 --parent root:人物     # Nested category
//! memtree add "张三28岁" --parent root:人物 # Memory leaf
//! memtree store /user/name 张三             # Value at an explicit path
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::utils::open_tree;
use crate::config::Config;
use crate::core::node::ROOT_ID;

#[derive(Args, Debug)]
pub struct MkcatArgs {
    /// Category name
    pub name: String,

    /// Parent node id
    #[arg(short, long, default_value = ROOT_ID)]
    pub parent: String,
}

pub fn run_mkcat(args: MkcatArgs, config: &Config) -> Result<()> {
    let mut tree = open_tree(config)?;
    let id = tree.create_subcategory(&args.parent, &args.name)?;

    println!("{} Created category: {}", "✓".green(), id.cyan());
    println!("   Path: {}", tree.display_path(&id));
    Ok(())
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Memory content
    pub content: String,

    /// Parent category id
    #[arg(short, long, default_value = ROOT_ID)]
    pub parent: String,
}

pub fn run_add(args: AddArgs, config: &Config) -> Result<()> {
    let mut tree = open_tree(config)?;
    let id = tree.add_memory(&args.content, &args.parent)?;

    println!("{} Stored memory: {}", "✓".green(), id.cyan());
    Ok(())
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Slash-separated path, e.g. /user/name
    pub path: String,

    /// Value to store
    pub value: String,
}

pub fn run_store(args: StoreArgs, config: &Config) -> Result<()> {
    let mut tree = open_tree(config)?;
    let id = tree.store(&args.path, &args.value)?;

    println!("{} Stored {} ({})", "✓".green(), tree.slash_path(&id).cyan(), id);
    Ok(())
}
