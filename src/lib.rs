//! memtree - Personal memory tree
//!
//! A hierarchical store for personal memories. Content is filed under
//! categories, persisted to a single JSON file after every change, and
//! recalled by path, keyword, lexical overlap or an external oracle.
//!
//! ## Key Concepts
//!
//! - **Flat arena**: nodes live in one map keyed by id; parents and
//!   children refer to each other by id only
//! - **Write-through**: every mutation is saved before it returns, and
//!   rolled back in memory if the save fails
//! - **Categories and memories**: categories are named nodes, memories are
//!   leaves named `记忆` holding content
//! - **Oracles**: retention, placement and relevance judgments come from
//!   pluggable async traits

pub mod agent;
pub mod cli;
pub mod config;
pub mod core;
pub mod oracle;

pub use crate::agent::{MemoryAgent, Placement, Recollection};
pub use crate::core::error::{Result, TreeError};
pub use crate::core::node::MemoryNode;
pub use crate::core::path::Path;
pub use crate::core::schema::Schema;
pub use crate::core::shared::SharedTree;
pub use crate::core::tree::MemoryTree;
pub use crate::oracle::ChatOracle;
