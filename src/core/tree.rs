//! Tree - The memory tree store
//!
//! Owns every node in a flat id-indexed arena and provides creation,
//! lookup, traversal, scoring and flattening over the whole tree.
//!
//! # Key Points
//! - Exactly one root (`root`), never removed
//! - Every mutation is written through to the store file before returning;
//!   if the write fails the in-memory change is rolled back
//! - Traversals are pre-order with children in insertion order

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use serde::Serialize;
use tracing::{info, warn};

use super::error::{Result, TreeError};
use super::node::{MemoryNode, ID_SEPARATOR, MEMORY_MARKER, ROOT_ID, ROOT_NAME};
use super::scoring::{overlap_score, MATCH_THRESHOLD, MAX_MATCHES};

/// Joiner for human-readable category paths
pub const PATH_JOINER: &str = " -> ";

/// Path shown for memories stored directly under the root
pub const UNCATEGORIZED: &str = "未分类";

/// A best-match candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub node_id: String,
    pub path: String,
    pub score: f64,
    pub has_content: bool,
}

/// A place new memories can attach to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryEntry {
    pub node_id: String,
    pub path: String,
}

/// One memory in the flattened view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatMemory {
    pub node_id: String,
    pub path: String,
    pub content: String,
}

/// Recursive dump of a subtree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeView {
    pub key: String,
    pub name: String,
    pub content: String,
    pub meta: NodeMeta,
    pub children: Vec<TreeView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMeta {
    pub id: String,
    pub access_count: u64,
    pub created_at: String,
    pub last_accessed: String,
}

/// Counts over the whole tree
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TreeStats {
    pub nodes: usize,
    pub categories: usize,
    pub memories: usize,
    pub max_depth: usize,
    pub total_accesses: u64,
}

/// Reverts one in-memory change when the write-through save fails
pub(crate) enum Undo {
    Inserted(String),
    Replaced(MemoryNode),
}

/// The memory tree
#[derive(Debug)]
pub struct MemoryTree {
    nodes: HashMap<String, MemoryNode>,
    next_seq: u64,
    store_path: Option<PathBuf>,
}

impl MemoryTree {
    /// A tree holding only the root, never written to disk (for testing)
    pub fn in_memory() -> Self {
        Self::with_root(None)
    }

    pub(crate) fn with_root(store_path: Option<PathBuf>) -> Self {
        let root = MemoryNode::root();
        let mut nodes = HashMap::new();
        nodes.insert(root.id.clone(), root);
        Self {
            nodes,
            next_seq: 1,
            store_path,
        }
    }

    /// Assemble a tree from already-linked nodes
    pub(crate) fn from_nodes(nodes: HashMap<String, MemoryNode>, store_path: PathBuf) -> Self {
        let next_seq = nodes.values().map(|n| n.seq).max().unwrap_or(0) + 1;
        Self {
            nodes,
            next_seq,
            store_path: Some(store_path),
        }
    }

    /// Durable file backing this tree, if any
    pub fn store_path(&self) -> Option<&Path> {
        self.store_path.as_deref()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&MemoryNode> {
        self.nodes.get(id)
    }

    pub fn root(&self) -> &MemoryNode {
        &self.nodes[ROOT_ID]
    }

    /// All indexed nodes, in no particular order
    pub fn nodes(&self) -> impl Iterator<Item = &MemoryNode> {
        self.nodes.values()
    }

    /// Look up the child of `parent_id` stored under `key`
    pub fn get_child(&self, parent_id: &str, key: &str) -> Option<&MemoryNode> {
        let parent = self.nodes.get(parent_id)?;
        let child_id = MemoryNode::child_id(parent_id, key);
        parent
            .children()
            .iter()
            .find(|id| **id == child_id)
            .and_then(|id| self.nodes.get(id))
    }

    /// Return the child under `key`, creating it with `content` if absent.
    ///
    /// An existing child is returned untouched; its content is never
    /// overwritten.
    pub fn add_child(&mut self, parent_id: &str, key: &str, content: &str) -> Result<String> {
        if !self.contains(parent_id) {
            return Err(TreeError::ParentNotFound(parent_id.to_string()));
        }
        let key = validate_name(key)?;
        if let Some(existing) = self.get_child(parent_id, &key) {
            return Ok(existing.id.clone());
        }

        let seq = self.alloc_seq();
        let node = MemoryNode::child(parent_id, key.clone(), key, content, seq);
        let id = self.insert(node);
        self.persist_or_rollback(vec![Undo::Inserted(id.clone())])?;
        Ok(id)
    }

    /// Create a category `name` under `parent_id`
    pub fn create_subcategory(&mut self, parent_id: &str, name: &str) -> Result<String> {
        if !self.contains(parent_id) {
            return Err(TreeError::ParentNotFound(parent_id.to_string()));
        }
        let name = validate_name(name)?;
        let child_id = MemoryNode::child_id(parent_id, &name);
        if self.contains(&child_id) {
            return Err(TreeError::DuplicateCategory(child_id));
        }

        let seq = self.alloc_seq();
        let node = MemoryNode::child(parent_id, name.clone(), name, "", seq);
        let id = self.insert(node);
        self.persist_or_rollback(vec![Undo::Inserted(id.clone())])?;

        info!(id = %id, "Created category");
        Ok(id)
    }

    /// Attach a memory leaf holding `content` under `parent_id`
    pub fn add_memory(&mut self, content: &str, parent_id: &str) -> Result<String> {
        if !self.contains(parent_id) {
            return Err(TreeError::ParentNotFound(parent_id.to_string()));
        }

        let mut seq = self.alloc_seq();
        while self.contains(&MemoryNode::child_id(parent_id, &format!("mem{}", seq))) {
            seq = self.alloc_seq();
        }

        let node = MemoryNode::memory(parent_id, content, seq);
        let id = self.insert(node);
        self.persist_or_rollback(vec![Undo::Inserted(id.clone())])?;

        info!(id = %id, "Stored memory");
        Ok(id)
    }

    /// Record an access on `id` and persist it
    pub fn touch(&mut self, id: &str) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))?;
        let before = node.clone();
        node.touch();
        self.persist_or_rollback(vec![Undo::Replaced(before)])
    }

    /// Touch several nodes with a single write
    pub fn touch_many(&mut self, ids: &[String]) -> Result<()> {
        if let Some(missing) = ids.iter().find(|id| !self.nodes.contains_key(*id)) {
            return Err(TreeError::NodeNotFound(missing.clone()));
        }

        let mut undo = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = self.nodes.get_mut(id) {
                undo.push(Undo::Replaced(node.clone()));
                node.touch();
            }
        }
        self.persist_or_rollback(undo)
    }

    /// Up to three nodes whose name and content best overlap `text`.
    ///
    /// Lexical heuristic only: see [`overlap_score`]. Ties keep traversal
    /// order.
    pub fn find_best_match(&self, text: &str) -> Vec<MatchCandidate> {
        let mut candidates: Vec<MatchCandidate> = self
            .preorder()
            .into_iter()
            .filter_map(|node| {
                let target = format!("{} {}", node.name, node.content);
                let score = overlap_score(text, &target);
                (score > MATCH_THRESHOLD).then(|| MatchCandidate {
                    node_id: node.id.clone(),
                    path: self.display_path(&node.id),
                    score,
                    has_content: node.has_content(),
                })
            })
            .collect();

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(MAX_MATCHES);
        candidates
    }

    /// Every category node in pre-order.
    ///
    /// When the tree has no categories at all, the root is offered instead
    /// so callers always have somewhere to attach.
    pub fn all_categories(&self) -> Vec<CategoryEntry> {
        let entries: Vec<CategoryEntry> = self
            .preorder()
            .into_iter()
            .filter(|node| node.is_category())
            .map(|node| CategoryEntry {
                node_id: node.id.clone(),
                path: self.display_path(&node.id),
            })
            .collect();

        if entries.is_empty() {
            vec![CategoryEntry {
                node_id: ROOT_ID.to_string(),
                path: ROOT_NAME.to_string(),
            }]
        } else {
            entries
        }
    }

    /// Every leaf holding content, with its category path
    pub fn flat_memory_view(&self) -> Vec<FlatMemory> {
        self.preorder()
            .into_iter()
            .filter(|node| {
                !node.is_root() && node.has_content() && (node.is_memory() || node.is_leaf())
            })
            .map(|node| {
                let parts: Vec<&str> = self
                    .lineage(&node.id)
                    .into_iter()
                    .filter(|n| !n.is_memory())
                    .map(|n| n.name.as_str())
                    .collect();
                let path = if parts.is_empty() {
                    UNCATEGORIZED.to_string()
                } else {
                    parts.join(PATH_JOINER)
                };
                FlatMemory {
                    node_id: node.id.clone(),
                    path,
                    content: node.content.trim().to_string(),
                }
            })
            .collect()
    }

    /// Nested dump of the whole tree; does not touch any node
    pub fn full_tree(&self) -> TreeView {
        self.view(self.root())
    }

    fn view(&self, node: &MemoryNode) -> TreeView {
        TreeView {
            key: node.key.clone(),
            name: node.name.clone(),
            content: node.content.clone(),
            meta: NodeMeta {
                id: node.id.clone(),
                access_count: node.access_count,
                created_at: node.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                last_accessed: node.last_accessed.to_rfc3339_opts(SecondsFormat::Millis, true),
            },
            children: node
                .children()
                .iter()
                .filter_map(|id| self.nodes.get(id))
                .map(|child| self.view(child))
                .collect(),
        }
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            nodes: self.nodes.len(),
            ..Default::default()
        };
        for node in self.nodes.values() {
            if node.is_memory() {
                stats.memories += 1;
            } else if node.is_category() {
                stats.categories += 1;
            }
            stats.total_accesses += node.access_count;
            stats.max_depth = stats.max_depth.max(node.id.matches(ID_SEPARATOR).count());
        }
        stats
    }

    /// Names from the root (exclusive) down to `id`, or `ROOT` for the root
    pub fn display_path(&self, id: &str) -> String {
        let names: Vec<&str> = self
            .lineage(id)
            .into_iter()
            .map(|n| n.name.as_str())
            .collect();
        if names.is_empty() {
            ROOT_NAME.to_string()
        } else {
            names.join(PATH_JOINER)
        }
    }

    /// Ancestors of `id` and the node itself, root excluded, root first
    pub fn lineage(&self, id: &str) -> Vec<&MemoryNode> {
        let mut chain = Vec::new();
        let mut current = self.nodes.get(id);
        while let Some(node) = current {
            if node.is_root() {
                break;
            }
            chain.push(node);
            current = node.parent_id.as_deref().and_then(|p| self.nodes.get(p));
        }
        chain.reverse();
        chain
    }

    /// All nodes reachable from the root, pre-order
    pub fn preorder(&self) -> Vec<&MemoryNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![ROOT_ID];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                out.push(node);
                stack.extend(node.children().iter().rev().map(String::as_str));
            }
        }
        out
    }

    pub(crate) fn alloc_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Index `node` and link it under its parent, which must exist
    pub(crate) fn insert(&mut self, node: MemoryNode) -> String {
        let id = node.id.clone();
        if let Some(parent) = node.parent_id.as_deref().and_then(|p| self.nodes.get_mut(p)) {
            parent.link_child(id.clone());
        }
        self.nodes.insert(id.clone(), node);
        id
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut MemoryNode> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn persist_or_rollback(&mut self, undo: Vec<Undo>) -> Result<()> {
        if let Err(err) = self.save() {
            warn!(error = %err, "Write-through failed, rolling back");
            for step in undo.into_iter().rev() {
                self.rollback(step);
            }
            return Err(err);
        }
        Ok(())
    }

    fn rollback(&mut self, step: Undo) {
        match step {
            Undo::Inserted(id) => {
                if let Some(node) = self.nodes.remove(&id) {
                    if let Some(parent) = node.parent_id.as_deref().and_then(|p| self.nodes.get_mut(p)) {
                        parent.unlink_child(&id);
                    }
                }
            }
            Undo::Replaced(node) => {
                self.nodes.insert(node.id.clone(), node);
            }
        }
    }
}

/// Check a category or path key and return it trimmed
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    let invalid = trimmed.is_empty()
        || trimmed == MEMORY_MARKER
        || trimmed.contains(ID_SEPARATOR)
        || trimmed.contains('/');
    if invalid {
        return Err(TreeError::InvalidName(name.to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people_and_events() -> MemoryTree {
        let mut tree = MemoryTree::in_memory();
        tree.create_subcategory("root", "人物").unwrap();
        tree.create_subcategory("root", "事件").unwrap();
        tree
    }

    #[test]
    fn test_create_subcategory() {
        let mut tree = MemoryTree::in_memory();
        let id = tree.create_subcategory("root", "人物").unwrap();
        assert_eq!(id, "root:人物");

        let child = tree.get_child("root", "人物").unwrap();
        assert_eq!(child.name, "人物");
        assert_eq!(child.parent_id.as_deref(), Some("root"));
    }

    #[test]
    fn test_duplicate_category() {
        let mut tree = MemoryTree::in_memory();
        tree.create_subcategory("root", "人物").unwrap();
        let before = tree.node_count();

        let err = tree.create_subcategory("root", "人物").unwrap_err();
        assert!(matches!(err, TreeError::DuplicateCategory(ref id) if id == "root:人物"));
        assert_eq!(tree.node_count(), before);
        assert_eq!(tree.root().children().len(), 1);
    }

    #[test]
    fn test_create_subcategory_missing_parent() {
        let mut tree = MemoryTree::in_memory();
        let err = tree.create_subcategory("root:nope", "x").unwrap_err();
        assert!(matches!(err, TreeError::ParentNotFound(_)));
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_invalid_names() {
        let mut tree = MemoryTree::in_memory();
        assert!(matches!(
            tree.create_subcategory("root", "  "),
            Err(TreeError::InvalidName(_))
        ));
        assert!(matches!(
            tree.create_subcategory("root", MEMORY_MARKER),
            Err(TreeError::InvalidName(_))
        ));
        assert!(matches!(
            tree.create_subcategory("root", "a:b"),
            Err(TreeError::InvalidName(_))
        ));
        assert!(matches!(
            tree.create_subcategory("root", "a/b"),
            Err(TreeError::InvalidName(_))
        ));
    }

    #[test]
    fn test_nested_subcategory() {
        let mut tree = people_and_events();
        let id = tree.create_subcategory("root:人物", "朋友").unwrap();
        assert_eq!(id, "root:人物:朋友");
        assert_eq!(tree.display_path(&id), "人物 -> 朋友");
    }

    #[test]
    fn test_add_memory() {
        let mut tree = people_and_events();
        let id = tree.add_memory("张三, 28岁", "root:人物").unwrap();

        let suffix = id.strip_prefix("root:人物:mem").unwrap();
        assert!(!suffix.is_empty());
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));

        let flat = tree.flat_memory_view();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].path, "人物");
        assert_eq!(flat[0].content, "张三, 28岁");
    }

    #[test]
    fn test_add_memory_missing_parent() {
        let mut tree = MemoryTree::in_memory();
        let err = tree.add_memory("x", "root:missing").unwrap_err();
        assert!(matches!(err, TreeError::ParentNotFound(_)));
    }

    #[test]
    fn test_rapid_add_memory_ids_are_unique() {
        let mut tree = people_and_events();
        let mut ids = std::collections::HashSet::new();
        for i in 0..500 {
            let id = tree.add_memory(&format!("fact {}", i), "root:人物").unwrap();
            assert!(ids.insert(id));
        }
        assert_eq!(tree.flat_memory_view().len(), 500);
    }

    #[test]
    fn test_add_child_is_idempotent() {
        let mut tree = MemoryTree::in_memory();
        let first = tree.add_child("root", "user", "original").unwrap();
        let second = tree.add_child("root", "user", "replacement").unwrap();

        assert_eq!(first, second);
        assert_eq!(tree.get(&first).unwrap().content, "original");
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn test_get_child_missing() {
        let tree = people_and_events();
        assert!(tree.get_child("root", "地点").is_none());
        assert!(tree.get_child("root:nope", "人物").is_none());
    }

    #[test]
    fn test_touch() {
        let mut tree = people_and_events();
        let id = tree.add_memory("likes tea", "root").unwrap();
        tree.touch(&id).unwrap();
        tree.touch(&id).unwrap();
        assert_eq!(tree.get(&id).unwrap().access_count, 2);

        assert!(matches!(
            tree.touch("root:missing"),
            Err(TreeError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_all_categories_excludes_root_and_memories() {
        let mut tree = people_and_events();
        tree.add_memory("张三", "root:人物").unwrap();

        let categories = tree.all_categories();
        let paths: Vec<&str> = categories.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["人物", "事件"]);
        assert_eq!(categories[0].node_id, "root:人物");
    }

    #[test]
    fn test_all_categories_empty_tree_offers_root() {
        let tree = MemoryTree::in_memory();
        let categories = tree.all_categories();
        assert_eq!(
            categories,
            vec![CategoryEntry {
                node_id: "root".to_string(),
                path: "ROOT".to_string(),
            }]
        );
    }

    #[test]
    fn test_all_categories_preorder() {
        let mut tree = people_and_events();
        tree.create_subcategory("root:人物", "朋友").unwrap();
        let paths: Vec<String> = tree.all_categories().into_iter().map(|c| c.path).collect();
        assert_eq!(paths, vec!["人物", "人物 -> 朋友", "事件"]);
    }

    #[test]
    fn test_flat_view_uncategorized() {
        let mut tree = MemoryTree::in_memory();
        tree.add_memory("  [原始] hello  ", "root").unwrap();
        let flat = tree.flat_memory_view();
        assert_eq!(flat[0].path, UNCATEGORIZED);
        assert_eq!(flat[0].content, "[原始] hello");
    }

    #[test]
    fn test_flat_view_skips_empty_categories_and_blank_memories() {
        let mut tree = people_and_events();
        tree.add_memory("   ", "root:事件").unwrap();
        assert!(tree.flat_memory_view().is_empty());
    }

    #[test]
    fn test_find_best_match_threshold_and_order() {
        let mut tree = MemoryTree::in_memory();
        tree.create_subcategory("root", "coffee").unwrap();
        tree.add_memory("likes green tea", "root").unwrap();
        tree.add_memory("likes black coffee", "root").unwrap();

        let matches = tree.find_best_match("black coffee");
        assert!(!matches.is_empty());
        assert!(matches.len() <= MAX_MATCHES);
        for pair in matches.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for m in &matches {
            assert!(m.score > MATCH_THRESHOLD);
        }
        assert_eq!(matches[0].score, 1.0);
        assert!(matches[0].has_content);
        // The category only shares "coffee": 1/2
        assert_eq!(matches[1].node_id, "root:coffee");
        assert!(!matches[1].has_content);
    }

    #[test]
    fn test_find_best_match_caps_at_three_and_keeps_traversal_order() {
        let mut tree = MemoryTree::in_memory();
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(tree.add_memory("rust", "root").unwrap());
        }
        let matches = tree.find_best_match("rust");
        assert_eq!(matches.len(), 3);
        let got: Vec<&str> = matches.iter().map(|m| m.node_id.as_str()).collect();
        assert_eq!(got, vec![ids[0].as_str(), ids[1].as_str(), ids[2].as_str()]);
    }

    #[test]
    fn test_find_best_match_paths() {
        let mut tree = people_and_events();
        tree.add_memory("张三 28岁", "root:人物").unwrap();
        let matches = tree.find_best_match("张三");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, format!("人物 -> {}", MEMORY_MARKER));
    }

    #[test]
    fn test_find_best_match_no_results() {
        let tree = people_and_events();
        assert!(tree.find_best_match("nothing relevant").is_empty());
    }

    #[test]
    fn test_full_tree_is_stable() {
        let mut tree = people_and_events();
        tree.add_memory("张三", "root:人物").unwrap();

        let first = tree.full_tree();
        let second = tree.full_tree();
        assert_eq!(first, second);

        assert_eq!(first.name, "ROOT");
        assert_eq!(first.children.len(), 2);
        assert_eq!(first.children[0].name, "人物");
        assert_eq!(first.children[0].children[0].content, "张三");
        assert_eq!(first.children[0].children[0].meta.access_count, 0);
    }

    #[test]
    fn test_index_and_links_are_consistent() {
        let mut tree = people_and_events();
        tree.create_subcategory("root:事件", "旅行").unwrap();
        tree.add_memory("上海", "root:事件:旅行").unwrap();
        tree.add_child("root", "user", "").unwrap();

        let reachable = tree.preorder();
        assert_eq!(reachable.len(), tree.node_count());
        for node in tree.nodes() {
            for child_id in node.children() {
                let child = tree.get(child_id).unwrap();
                assert_eq!(child.parent_id.as_deref(), Some(node.id.as_str()));
            }
        }
    }

    #[test]
    fn test_stats() {
        let mut tree = people_and_events();
        let id = tree.add_memory("张三", "root:人物").unwrap();
        tree.touch(&id).unwrap();

        let stats = tree.stats();
        assert_eq!(stats.nodes, 4);
        assert_eq!(stats.categories, 2);
        assert_eq!(stats.memories, 1);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(stats.total_accesses, 1);
    }
}
