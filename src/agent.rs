//! Memory agent - Oracle-assisted remember and recall
//!
//! Wraps a [`SharedTree`] with the three oracles. Oracle trouble never
//! fails an insertion: placement falls back to storing the raw text under
//! the root. Only persistence errors reach the caller.
//!
//! Locks are released before every oracle call and re-taken afterwards,
//! so a slow model never blocks other readers or writers.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::error::{Result, TreeError};
use crate::core::node::ROOT_ID;
use crate::core::shared::SharedTree;
use crate::core::tree::{FlatMemory, MemoryTree};
use crate::oracle::{PlacementDecision, PlacementOracle, RelevanceOracle, RetentionOracle};

/// Prefix on content stored without a placement decision
pub const RAW_PREFIX: &str = "[原始] ";

/// Characters of raw content kept in a fallback label
pub const LABEL_CHARS: usize = 20;

/// Reply when nothing relevant was recalled
pub const NO_RELEVANT_MEMORY: &str = "无相关记忆。";

/// Where a new memory ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub node_id: String,
    pub parent_id: String,
    /// Stored summary, or a truncated label on fallback
    pub label: String,
    /// True when the oracle could not place the content
    pub fallback: bool,
}

/// Result of a relevance search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recollection {
    Relevant(Vec<FlatMemory>),
    NoRelevantMemory,
}

impl Recollection {
    pub fn memories(&self) -> &[FlatMemory] {
        match self {
            Self::Relevant(memories) => memories,
            Self::NoRelevantMemory => &[],
        }
    }
}

impl fmt::Display for Recollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relevant(memories) => {
                let lines: Vec<String> = memories
                    .iter()
                    .map(|m| format!("{}: {}", m.path, m.content))
                    .collect();
                write!(f, "{}", lines.join("\n"))
            }
            Self::NoRelevantMemory => write!(f, "{}", NO_RELEVANT_MEMORY),
        }
    }
}

pub struct MemoryAgent {
    tree: SharedTree,
    placement: Arc<dyn PlacementOracle>,
    retention: Arc<dyn RetentionOracle>,
    relevance: Arc<dyn RelevanceOracle>,
}

impl MemoryAgent {
    pub fn new(
        tree: SharedTree,
        placement: Arc<dyn PlacementOracle>,
        retention: Arc<dyn RetentionOracle>,
        relevance: Arc<dyn RelevanceOracle>,
    ) -> Self {
        Self {
            tree,
            placement,
            retention,
            relevance,
        }
    }

    /// One oracle answering all three questions
    pub fn with_oracle<O>(tree: SharedTree, oracle: Arc<O>) -> Self
    where
        O: PlacementOracle + RetentionOracle + RelevanceOracle + 'static,
    {
        Self::new(tree, oracle.clone(), oracle.clone(), oracle)
    }

    pub fn tree(&self) -> &SharedTree {
        &self.tree
    }

    /// Ask the retention oracle; any failure means no
    pub async fn maybe_remember(&self, text: &str) -> bool {
        match self.retention.should_remember(text).await {
            Ok(keep) => keep,
            Err(e) => {
                warn!(error = %e, "Retention oracle failed, not remembering");
                false
            }
        }
    }

    /// Gate with the retention oracle, then classify and store
    pub async fn remember(&self, text: &str) -> Result<Option<Placement>> {
        if !self.maybe_remember(text).await {
            debug!("Retention oracle declined");
            return Ok(None);
        }
        self.classify_and_store(text).await.map(Some)
    }

    /// Place `content` in the tree with the placement oracle's help
    pub async fn classify_and_store(&self, content: &str) -> Result<Placement> {
        let categories = self.tree.with_read(|tree| tree.all_categories())?;

        let decision = match self.placement.place(content, &categories).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "Placement oracle failed, storing raw content under root");
                return self.store_raw(content);
            }
        };

        match self.tree.with_write(|tree| apply(tree, &decision)) {
            Ok(placement) => Ok(placement),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(error = %e, "Placement rejected, storing raw content under root");
                self.store_raw(content)
            }
        }
    }

    fn store_raw(&self, content: &str) -> Result<Placement> {
        let raw = format!("{}{}", RAW_PREFIX, content);
        let node_id = self.tree.with_write(|tree| {
            let id = tree.add_memory(&raw, ROOT_ID)?;
            tree.touch(&id)?;
            Ok(id)
        })?;

        Ok(Placement {
            node_id,
            parent_id: ROOT_ID.to_string(),
            label: truncate_label(content),
            fallback: true,
        })
    }

    /// Memories the relevance oracle picks for `query`; each is touched
    pub async fn search_memory(&self, query: &str) -> Result<Recollection> {
        let memories = self.tree.with_read(|tree| tree.flat_memory_view())?;
        if memories.is_empty() {
            return Ok(Recollection::NoRelevantMemory);
        }

        let selected = match self.relevance.select_relevant(query, &memories).await {
            Ok(selected) => selected,
            Err(e) => {
                warn!(error = %e, "Relevance oracle failed");
                return Ok(Recollection::NoRelevantMemory);
            }
        };

        let mut seen = HashSet::new();
        let picked: Vec<FlatMemory> = selected
            .into_iter()
            .filter(|&index| index >= 1 && index <= memories.len())
            .filter(|&index| seen.insert(index))
            .map(|index| memories[index - 1].clone())
            .collect();

        if picked.is_empty() {
            return Ok(Recollection::NoRelevantMemory);
        }

        let ids: Vec<String> = picked.iter().map(|m| m.node_id.clone()).collect();
        self.tree.with_write(|tree| tree.touch_many(&ids))?;

        Ok(Recollection::Relevant(picked))
    }
}

/// Apply a placement decision under the write lock
fn apply(tree: &mut MemoryTree, decision: &PlacementDecision) -> Result<Placement> {
    let parent_id = match decision {
        PlacementDecision::Attach { target_id, .. } => {
            let valid = tree
                .get(target_id)
                .map(|node| !node.is_memory())
                .unwrap_or(false);
            if valid {
                target_id.clone()
            } else {
                warn!(target = %target_id, "Unknown target category, attaching to root");
                ROOT_ID.to_string()
            }
        }
        PlacementDecision::Create { category, .. } => {
            match tree.create_subcategory(ROOT_ID, category) {
                Ok(id) => id,
                Err(TreeError::DuplicateCategory(id)) => {
                    debug!(id = %id, "Category exists, attaching to it");
                    id
                }
                Err(e) => return Err(e),
            }
        }
    };

    let summary = decision.summary();
    let node_id = tree.add_memory(summary, &parent_id)?;
    tree.touch(&node_id)?;

    Ok(Placement {
        node_id,
        parent_id,
        label: summary.to_string(),
        fallback: false,
    })
}

fn truncate_label(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() > LABEL_CHARS {
        let head: String = trimmed.chars().take(LABEL_CHARS).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}
