//! CLI module - Command definitions and handlers

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

pub mod add;
pub mod browse;
pub mod init;
pub mod remember;
pub mod search;
pub mod stats;
pub mod utils;

/// memtree - Personal memory tree
///
/// Files what you tell it into a category tree and recalls it later.
#[derive(Parser, Debug)]
#[command(name = "memtree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, env = "MEMTREE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new memory store
    Init(init::InitArgs),

    /// Create a category
    Mkcat(add::MkcatArgs),

    /// Add a memory under a category
    Add(add::AddArgs),

    /// Store a value at an explicit path
    Store(add::StoreArgs),

    /// Read the value at a path
    Get(search::GetArgs),

    /// Keyword search over keys and content
    Search(search::SearchArgs),

    /// Best lexical matches for a piece of text
    Match(search::MatchArgs),

    /// Ask the oracle which memories answer a question
    Ask(search::AskArgs),

    /// List categories
    Categories(browse::CategoriesArgs),

    /// List every memory with its category path
    Flat(browse::FlatArgs),

    /// Show the whole tree
    Tree(browse::TreeArgs),

    /// Show store statistics
    Stats(stats::StatsArgs),

    /// Let the oracle decide whether and where to remember text
    Remember(remember::RememberArgs),
}

/// Output format shared by listing commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
}
