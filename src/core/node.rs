//! Node - A single element of the memory tree
//!
//! Nodes live in a flat arena owned by [`MemoryTree`](super::tree::MemoryTree).
//! A node records its children as an ordered list of ids and its parent as a
//! plain id, so the structure has no reference cycles.
//!
//! # Identity
//! - Root: `root`
//! - Category or path node: `<parent_id>:<name>` (e.g. `root:人物`)
//! - Memory leaf: `<parent_id>:mem<seq>` (e.g. `root:人物:mem7`)

use chrono::{DateTime, Utc};

/// Reserved id of the root node
pub const ROOT_ID: &str = "root";

/// Display name of the root node
pub const ROOT_NAME: &str = "ROOT";

/// Reserved name that marks a node as a memory leaf
pub const MEMORY_MARKER: &str = "记忆";

/// Separator between the parent id and the child key in a node id
pub const ID_SEPARATOR: char = ':';

/// A node in the memory tree
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryNode {
    /// Unique id (`<parent_id>:<key>`, or `root`)
    pub id: String,

    /// Key under the parent (last id segment)
    pub key: String,

    /// Display name (category name, or [`MEMORY_MARKER`] for leaves)
    pub name: String,

    /// Free-text content, empty for pure categories
    pub content: String,

    /// Parent id, `None` only for the root
    pub parent_id: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last time the content was read for an answer or written
    pub last_accessed: DateTime<Utc>,

    /// Number of touches
    pub access_count: u64,

    /// Store-wide insertion sequence, used to order siblings on reload
    pub seq: u64,

    /// Child ids in insertion order
    children: Vec<String>,
}

impl MemoryNode {
    /// Create the root node
    pub fn root() -> Self {
        let now = Utc::now();
        Self {
            id: ROOT_ID.to_string(),
            key: ROOT_ID.to_string(),
            name: ROOT_NAME.to_string(),
            content: String::new(),
            parent_id: None,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            seq: 0,
            children: Vec::new(),
        }
    }

    /// Create an unlinked child of `parent_id` with the given key
    pub fn child(
        parent_id: &str,
        key: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
        seq: u64,
    ) -> Self {
        let key = key.into();
        let now = Utc::now();
        Self {
            id: Self::child_id(parent_id, &key),
            key,
            name: name.into(),
            content: content.into(),
            parent_id: Some(parent_id.to_string()),
            created_at: now,
            last_accessed: now,
            access_count: 0,
            seq,
            children: Vec::new(),
        }
    }

    /// Create an unlinked memory leaf under `parent_id`
    pub fn memory(parent_id: &str, content: impl Into<String>, seq: u64) -> Self {
        Self::child(parent_id, format!("mem{}", seq), MEMORY_MARKER, content, seq)
    }

    /// Build the id a child with `key` would have under `parent_id`
    pub fn child_id(parent_id: &str, key: &str) -> String {
        format!("{}{}{}", parent_id, ID_SEPARATOR, key)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Memory leaves carry the reserved marker name
    pub fn is_memory(&self) -> bool {
        self.name == MEMORY_MARKER
    }

    /// Any non-root node that is not a memory leaf
    pub fn is_category(&self) -> bool {
        !self.is_root() && !self.is_memory()
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Child ids in insertion order
    pub fn children(&self) -> &[String] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn link_child(&mut self, child_id: String) {
        if !self.children.contains(&child_id) {
            self.children.push(child_id);
        }
    }

    pub(crate) fn unlink_child(&mut self, child_id: &str) {
        self.children.retain(|id| id != child_id);
    }

    /// Record an access now
    pub fn touch(&mut self) {
        self.touch_at(Utc::now());
    }

    /// Record an access at `now`; the timestamp never moves backwards
    pub fn touch_at(&mut self, now: DateTime<Utc>) {
        if now > self.last_accessed {
            self.last_accessed = now;
        }
        self.access_count += 1;
    }
}

impl std::fmt::Display for MemoryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.content.is_empty() {
            write!(f, "[{}] {}", self.id, self.name)
        } else {
            write!(f, "[{}] {}: {}", self.id, self.name, self.content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_root() {
        let root = MemoryNode::root();
        assert_eq!(root.id, ROOT_ID);
        assert_eq!(root.name, ROOT_NAME);
        assert!(root.is_root());
        assert!(!root.is_category());
        assert!(!root.is_memory());
    }

    #[test]
    fn test_child_id() {
        let node = MemoryNode::child("root", "人物", "人物", "", 1);
        assert_eq!(node.id, "root:人物");
        assert_eq!(node.parent_id.as_deref(), Some("root"));
        assert!(node.is_category());
    }

    #[test]
    fn test_memory_leaf() {
        let node = MemoryNode::memory("root:人物", "张三, 28岁", 12);
        assert_eq!(node.id, "root:人物:mem12");
        assert_eq!(node.key, "mem12");
        assert_eq!(node.name, MEMORY_MARKER);
        assert!(node.is_memory());
        assert!(node.has_content());
    }

    #[test]
    fn test_touch_increments() {
        let mut node = MemoryNode::child("root", "a", "a", "", 1);
        let before = node.last_accessed;
        node.touch();
        node.touch();
        assert_eq!(node.access_count, 2);
        assert!(node.last_accessed >= before);
    }

    #[test]
    fn test_touch_never_moves_backwards() {
        let mut node = MemoryNode::child("root", "a", "a", "", 1);
        let later = node.last_accessed + Duration::seconds(60);
        node.touch_at(later);
        node.touch_at(later - Duration::seconds(120));
        assert_eq!(node.last_accessed, later);
        assert_eq!(node.access_count, 2);
    }

    #[test]
    fn test_link_child_is_idempotent() {
        let mut root = MemoryNode::root();
        root.link_child("root:a".to_string());
        root.link_child("root:a".to_string());
        root.link_child("root:b".to_string());
        assert_eq!(root.children(), &["root:a", "root:b"]);
    }

    #[test]
    fn test_blank_content_is_not_content() {
        let node = MemoryNode::memory("root", "   ", 1);
        assert!(!node.has_content());
    }

    #[test]
    fn test_display() {
        let node = MemoryNode::memory("root", "likes tea", 3);
        let display = format!("{}", node);
        assert!(display.contains("root:mem3"));
        assert!(display.contains("likes tea"));
    }
}
