//! `memtree init` command
//!
//! Creates `.memtree/` with a config, a schema and a seeded store.
//!
//! # Usage
//! ```bash
//! memtree init                          # Initialize in current directory
//! memtree init /path/to/project         # Initialize in specific path
//! memtree init --global                 # Initialize global ~/.memtree
//! memtree init --schema my_schema.json  # Seed from a custom schema
//! ```

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

use crate::config::{Config, CONFIG_DIR, CONFIG_FILE, SCHEMA_FILE, STORE_FILE};
use crate::core::schema::Schema;
use crate::core::tree::MemoryTree;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to initialize (default: current directory)
    pub path: Option<PathBuf>,

    /// Initialize global store (~/.memtree)
    #[arg(long)]
    pub global: bool,

    /// Schema file to seed categories from (default: built-in skeleton)
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Force re-initialization; an existing store and schema are kept
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let memtree_dir = if args.global {
        Config::global_dir().context("Cannot determine home directory")?
    } else {
        args.path
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR)
    };

    if memtree_dir.exists() && !args.force {
        bail!(
            "{} already exists. Use --force to reinitialize.",
            memtree_dir.display()
        );
    }

    let custom_schema = args.schema.as_deref().map(Schema::load).transpose()?;

    fs::create_dir_all(&memtree_dir)
        .with_context(|| format!("Failed to create {}", memtree_dir.display()))?;

    let config_path = memtree_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        Config::default().save_to(&config_path)?;
    }

    // An existing schema is only replaced by an explicit --schema
    let schema_path = memtree_dir.join(SCHEMA_FILE);
    let schema = match custom_schema {
        Some(schema) => Some(schema),
        None if schema_path.exists() => None,
        None => Some(Schema::default_skeleton()),
    };
    if let Some(schema) = schema {
        fs::write(&schema_path, schema.to_json_pretty())
            .with_context(|| format!("Failed to write {}", schema_path.display()))?;
    }

    let store_path = memtree_dir.join(STORE_FILE);
    let existed = store_path.exists();
    let tree = MemoryTree::open(&store_path, &schema_path)?;

    println!("{} Initialized memory store", "✓".green());
    println!("   Config: {}", config_path.display());
    println!("   Schema: {}", schema_path.display());
    if existed {
        println!("   Store:  {} (kept, {} nodes)", store_path.display(), tree.node_count());
    } else {
        println!("   Store:  {}", store_path.display());
    }
    println!("\nNext steps:");
    println!("  memtree categories");
    println!("  memtree store /user/name \"Your name\"");
    println!("  memtree remember \"Something worth keeping\"");

    Ok(())
}
