//! `memtree get`, `search`, `match` and `ask` commands
//!
//! # Usage
//! ```bash
//! memtree get /user/name            # Exact path, no side effects
//! memtree search ai                 # Keyword recall (touches hits)
//! memtree match "张三 年龄"         # Lexical best-match candidates
//! memtree ask "张三多大了?"         # Oracle-selected memories
//! ```

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::utils::{open_agent, open_tree, print_json};
use super::OutputFormat;
use crate::agent::Recollection;
use crate::config::Config;
use crate::core::path_store::RecallQuery;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Slash-separated path
    pub path: String,
}

pub fn run_get(args: GetArgs, config: &Config) -> Result<()> {
    let tree = open_tree(config)?;
    match tree.retrieve(&args.path)? {
        Some(value) => {
            println!("{}", value);
            Ok(())
        }
        None => bail!("Nothing stored at {}", args.path),
    }
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Keyword matched against keys and content (case-insensitive)
    pub keyword: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

pub fn run_search(args: SearchArgs, config: &Config) -> Result<()> {
    let mut tree = open_tree(config)?;
    let hits = tree.recall(&RecallQuery::Keyword {
        keyword: args.keyword.clone(),
    })?;

    if args.format == OutputFormat::Json {
        return print_json(&hits);
    }

    if hits.is_empty() {
        println!("No matches for: {}", args.keyword);
        return Ok(());
    }

    for hit in &hits {
        if hit.value.is_empty() {
            println!("{}", hit.path.cyan());
        } else {
            println!("{}  {}", hit.path.cyan(), hit.value);
        }
    }
    println!("\n{} match(es)", hits.len());
    Ok(())
}

#[derive(Args, Debug)]
pub struct MatchArgs {
    /// Text to match against node names and content
    pub text: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

#[derive(Tabled)]
struct MatchRow {
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Id")]
    id: String,
}

pub fn run_match(args: MatchArgs, config: &Config) -> Result<()> {
    let tree = open_tree(config)?;
    let candidates = tree.find_best_match(&args.text);

    if args.format == OutputFormat::Json {
        return print_json(&candidates);
    }

    if candidates.is_empty() {
        println!("No node matches: {}", args.text);
        return Ok(());
    }

    let rows: Vec<MatchRow> = candidates
        .iter()
        .map(|c| MatchRow {
            score: format!("{:.2}", c.score),
            path: c.path.clone(),
            id: c.node_id.clone(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Question to answer from memory
    pub query: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

pub async fn run_ask(args: AskArgs, config: &Config) -> Result<()> {
    let agent = open_agent(config)?;
    let recollection = agent.search_memory(&args.query).await?;

    if args.format == OutputFormat::Json {
        return print_json(recollection.memories());
    }

    match recollection {
        Recollection::NoRelevantMemory => println!("{}", recollection.to_string().dimmed()),
        Recollection::Relevant(ref memories) => {
            for memory in memories {
                println!("{}: {}", memory.path.cyan(), memory.content);
            }
        }
    }
    Ok(())
}
