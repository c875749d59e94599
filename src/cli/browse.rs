//! `memtree categories`, `flat` and `tree` commands
//!
//! Browse the memory tree. None of these touch any node.
//!
//! # Usage
//! ```bash
//! memtree categories               # Category table
//! memtree flat                     # Every memory with its path
//! memtree tree --depth 2           # Indented tree
//! memtree tree --format json       # Full dump with metadata
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::utils::{open_tree, print_json};
use super::OutputFormat;
use crate::config::Config;
use crate::core::node::MEMORY_MARKER;
use crate::core::tree::TreeView;

#[derive(Args, Debug)]
pub struct CategoriesArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Id")]
    id: String,
}

pub fn run_categories(args: CategoriesArgs, config: &Config) -> Result<()> {
    let tree = open_tree(config)?;
    let categories = tree.all_categories();

    if args.format == OutputFormat::Json {
        return print_json(&categories);
    }

    let rows: Vec<CategoryRow> = categories
        .into_iter()
        .map(|c| CategoryRow {
            path: c.path,
            id: c.node_id,
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

#[derive(Args, Debug)]
pub struct FlatArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

pub fn run_flat(args: FlatArgs, config: &Config) -> Result<()> {
    let tree = open_tree(config)?;
    let memories = tree.flat_memory_view();

    if args.format == OutputFormat::Json {
        return print_json(&memories);
    }

    if memories.is_empty() {
        println!("No memories stored yet.");
        return Ok(());
    }

    for (i, memory) in memories.iter().enumerate() {
        println!("{:>3}. [{}] {}", i + 1, memory.path.cyan(), memory.content);
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Maximum depth (0 = unlimited)
    #[arg(short, long, default_value = "0")]
    pub depth: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

pub fn run_tree(args: TreeArgs, config: &Config) -> Result<()> {
    let tree = open_tree(config)?;
    let view = tree.full_tree();

    if args.format == OutputFormat::Json {
        return print_json(&view);
    }

    println!("{}", view.name.bold());
    print_children(&view, args.depth, 1, "");

    let stats = tree.stats();
    println!(
        "\n{} categories, {} memories",
        stats.categories, stats.memories
    );
    Ok(())
}

fn print_children(view: &TreeView, max_depth: usize, depth: usize, prefix: &str) {
    if max_depth > 0 && depth > max_depth {
        return;
    }

    let count = view.children.len();
    for (i, child) in view.children.iter().enumerate() {
        let last = i + 1 == count;
        let branch = if last { "└── " } else { "├── " };

        let label = if child.content.is_empty() {
            child.name.cyan().to_string()
        } else if child.name == MEMORY_MARKER {
            child.content.clone()
        } else {
            format!("{}: {}", child.name.cyan(), child.content)
        };
        println!("{}{}{}", prefix, branch, label);

        let next = format!("{}{}", prefix, if last { "    " } else { "│   " });
        print_children(child, max_depth, depth + 1, &next);
    }
}
