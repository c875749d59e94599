//! Path store - Explicit-path access to the memory tree
//!
//! Stores values at `/`-separated paths and recalls them by exact path or
//! keyword. Intermediate nodes are created on demand; they are ordinary
//! category nodes, so path-stored values also show up in the category list
//! and the flat memory view.
//!
//! # Usage
//! ```
//! use memtree::core::tree::MemoryTree;
//! use memtree::core::path_store::RecallQuery;
//!
//! let mut tree = MemoryTree::in_memory();
//! tree.store("/user/name", "张三").unwrap();
//! assert_eq!(tree.retrieve("/user/name").unwrap(), Some("张三"));
//!
//! let hits = tree.recall(&RecallQuery::Keyword { keyword: "USER".into() }).unwrap();
//! assert_eq!(hits[0].path, "/user");
//! ```

use serde::{Deserialize, Serialize};

use super::error::{Result, TreeError};
use super::node::{MemoryNode, ROOT_ID};
use super::path::Path;
use super::tree::{MemoryTree, Undo};

/// One recalled value and where it lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecallHit {
    pub path: String,
    pub value: String,
}

/// A structured recall request
///
/// ```json
/// {"type": "exact", "path": "/user/name"}
/// {"type": "keyword", "keyword": "AI"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecallQuery {
    Exact { path: String },
    Keyword { keyword: String },
}

impl MemoryTree {
    /// Store `value` at `path`, creating missing nodes along the way.
    ///
    /// Unlike [`MemoryTree::add_child`], this overwrites the content of the
    /// final node. Returns the node id.
    pub fn store(&mut self, path: &str, value: &str) -> Result<String> {
        let path = Path::parse(path)?;
        if path.is_root() {
            return Err(TreeError::InvalidPath("cannot store at the root".to_string()));
        }

        let mut undo = Vec::new();
        let mut current = ROOT_ID.to_string();
        for key in path.segments() {
            if let Some(child) = self.get_child(&current, key) {
                current = child.id.clone();
                continue;
            }
            let seq = self.alloc_seq();
            let id = self.insert(MemoryNode::child(&current, key.as_str(), key.as_str(), "", seq));
            undo.push(Undo::Inserted(id.clone()));
            current = id;
        }

        let node = self
            .node_mut(&current)
            .ok_or_else(|| TreeError::NodeNotFound(current.clone()))?;
        undo.push(Undo::Replaced(node.clone()));
        node.content = value.to_string();
        node.touch();

        self.persist_or_rollback(undo)?;
        Ok(current)
    }

    /// Resolve a parsed path to its node
    pub fn resolve(&self, path: &Path) -> Option<&MemoryNode> {
        self.get(&path.to_node_id())
    }

    /// Content stored at `path`, if the node exists. No side effects.
    pub fn retrieve(&self, path: &str) -> Result<Option<&str>> {
        let path = Path::parse(path)?;
        Ok(self.resolve(&path).map(|node| node.content.as_str()))
    }

    /// Nodes whose key or content contains `keyword`, case-insensitively.
    /// Memory leaves match on content only. The root is never reported; a
    /// blank keyword matches nothing.
    pub fn search_by_keyword(&self, keyword: &str) -> Vec<RecallHit> {
        self.keyword_matches(keyword)
            .into_iter()
            .map(|node| self.hit(node))
            .collect()
    }

    fn keyword_matches(&self, keyword: &str) -> Vec<&MemoryNode> {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.preorder()
            .into_iter()
            .filter(|node| !node.is_root())
            .filter(|node| {
                // Memory leaf keys are internal counters, not user text
                (!node.is_memory() && node.key.to_lowercase().contains(&needle))
                    || node.content.to_lowercase().contains(&needle)
            })
            .collect()
    }

    fn hit(&self, node: &MemoryNode) -> RecallHit {
        RecallHit {
            path: self.slash_path(&node.id),
            value: node.content.clone(),
        }
    }

    /// Run a recall query; every returned node is touched
    pub fn recall(&mut self, query: &RecallQuery) -> Result<Vec<RecallHit>> {
        let (hits, ids): (Vec<RecallHit>, Vec<String>) = match query {
            RecallQuery::Exact { path } => {
                let parsed = Path::parse(path)?;
                match self.resolve(&parsed) {
                    Some(node) if !node.content.is_empty() => (
                        vec![RecallHit {
                            path: parsed.to_string(),
                            value: node.content.clone(),
                        }],
                        vec![node.id.clone()],
                    ),
                    _ => (Vec::new(), Vec::new()),
                }
            }
            RecallQuery::Keyword { keyword } => self
                .keyword_matches(keyword)
                .into_iter()
                .map(|node| (self.hit(node), node.id.clone()))
                .unzip(),
        };

        if !ids.is_empty() {
            self.touch_many(&ids)?;
        }
        Ok(hits)
    }

    /// `/key1/key2` rendering of a node's position
    pub fn slash_path(&self, id: &str) -> String {
        let keys: Vec<&str> = self
            .lineage(id)
            .into_iter()
            .map(|node| node.key.as_str())
            .collect();
        format!("/{}", keys.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_retrieve() {
        let mut tree = MemoryTree::in_memory();
        let id = tree.store("/user/name", "张三").unwrap();
        assert_eq!(id, "root:user:name");
        assert_eq!(tree.retrieve("/user/name").unwrap(), Some("张三"));
        assert_eq!(tree.retrieve("user/name/").unwrap(), Some("张三"));
        assert_eq!(tree.retrieve("/user").unwrap(), Some(""));
        assert_eq!(tree.retrieve("/user/age").unwrap(), None);
    }

    #[test]
    fn test_store_overwrites_value_but_reuses_nodes() {
        let mut tree = MemoryTree::in_memory();
        tree.store("/user/name", "张三").unwrap();
        let count = tree.node_count();
        tree.store("/user/name", "李四").unwrap();

        assert_eq!(tree.node_count(), count);
        assert_eq!(tree.retrieve("/user/name").unwrap(), Some("李四"));
        assert_eq!(tree.get("root:user:name").unwrap().access_count, 2);
    }

    #[test]
    fn test_store_at_root_is_rejected() {
        let mut tree = MemoryTree::in_memory();
        assert!(matches!(tree.store("/", "x"), Err(TreeError::InvalidPath(_))));
        assert!(matches!(tree.store("", "x"), Err(TreeError::InvalidPath(_))));
    }

    #[test]
    fn test_store_under_existing_category() {
        let mut tree = MemoryTree::in_memory();
        tree.create_subcategory("root", "人物").unwrap();
        let id = tree.store("/人物/张三", "28岁").unwrap();
        assert_eq!(id, "root:人物:张三");

        let flat = tree.flat_memory_view();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].path, "人物 -> 张三");
        assert_eq!(flat[0].content, "28岁");
    }

    #[test]
    fn test_keyword_search() {
        let mut tree = MemoryTree::in_memory();
        tree.store("/user/name", "张三").unwrap();
        tree.store("/projects/ai", "building an AI memory").unwrap();
        tree.store("/projects/web", "static site").unwrap();

        let hits = tree.search_by_keyword("ai");
        let paths: Vec<&str> = hits.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(paths, vec!["/projects/ai"]);

        let hits = tree.search_by_keyword("PROJECTS");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "/projects");

        assert!(tree.search_by_keyword("  ").is_empty());
        assert!(tree.search_by_keyword("root").is_empty());
    }

    #[test]
    fn test_keyword_search_ignores_memory_leaf_keys() {
        let mut tree = MemoryTree::in_memory();
        tree.create_subcategory("root", "人物").unwrap();
        for i in 0..31 {
            tree.add_memory(&format!("fact {}", i), "root:人物").unwrap();
        }

        assert!(tree.search_by_keyword("mem").is_empty());

        let hits = tree.search_by_keyword("31");
        assert!(hits.is_empty(), "unexpected hits: {:?}", hits);

        let hits = tree.search_by_keyword("fact 29");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, "fact 29");

        // Category keys still match
        assert_eq!(tree.search_by_keyword("人物").len(), 1);
    }

    #[test]
    fn test_recall_exact() {
        let mut tree = MemoryTree::in_memory();
        tree.store("/user/name", "张三").unwrap();

        let hits = tree
            .recall(&RecallQuery::Exact {
                path: "user/name".to_string(),
            })
            .unwrap();
        assert_eq!(
            hits,
            vec![RecallHit {
                path: "/user/name".to_string(),
                value: "张三".to_string(),
            }]
        );
        assert_eq!(tree.get("root:user:name").unwrap().access_count, 2);

        let empty = tree
            .recall(&RecallQuery::Exact {
                path: "/user".to_string(),
            })
            .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_recall_keyword_touches_hits() {
        let mut tree = MemoryTree::in_memory();
        tree.store("/hobby", "likes AI research").unwrap();
        let hits = tree
            .recall(&RecallQuery::Keyword {
                keyword: "ai".to_string(),
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(tree.get("root:hobby").unwrap().access_count, 2);
    }

    #[test]
    fn test_recall_query_json() {
        let query: RecallQuery =
            serde_json::from_str(r#"{"type": "exact", "path": "/user/name"}"#).unwrap();
        assert_eq!(
            query,
            RecallQuery::Exact {
                path: "/user/name".to_string()
            }
        );

        let query: RecallQuery =
            serde_json::from_str(r#"{"type": "keyword", "keyword": "AI"}"#).unwrap();
        assert!(matches!(query, RecallQuery::Keyword { .. }));

        assert!(serde_json::from_str::<RecallQuery>(r#"{"type": "fuzzy"}"#).is_err());
    }

    #[test]
    fn test_slash_path_for_memory_leaf() {
        let mut tree = MemoryTree::in_memory();
        tree.create_subcategory("root", "人物").unwrap();
        let id = tree.add_memory("张三", "root:人物").unwrap();
        let key = &tree.get(&id).unwrap().key;
        assert_eq!(tree.slash_path(&id), format!("/人物/{}", key));
    }
}
