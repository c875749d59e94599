//! CLI utility functions
//!
//! Opening the store and the agent from config, shared by every command.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::agent::MemoryAgent;
use crate::config::Config;
use crate::core::error::TreeError;
use crate::core::tree::MemoryTree;
use crate::oracle::ChatOracle;

/// Open the configured store, seeding it from the schema on first use
pub fn open_tree(config: &Config) -> Result<MemoryTree> {
    let store = config.store_path();
    let schema = config.schema_path();

    MemoryTree::open(&store, &schema).map_err(|e| match e {
        TreeError::SchemaLoad { .. } if !store.exists() => anyhow::Error::new(e)
            .context("No memory store found. Run 'memtree init' first."),
        other => anyhow::Error::new(other)
            .context(format!("Failed to open store {}", store.display())),
    })
}

/// Open the store and wrap it in an agent backed by the configured oracle
pub fn open_agent(config: &Config) -> Result<MemoryAgent> {
    let tree = open_tree(config)?;
    let oracle = ChatOracle::from_config(&config.oracle).context("Failed to set up oracle")?;
    Ok(MemoryAgent::with_oracle(tree.into(), Arc::new(oracle)))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
