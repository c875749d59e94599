//! Persistence - Flat JSON store file
//!
//! The tree is saved as a flat table of node records keyed by id. Children
//! are not serialized; they are rebuilt from `parent_id` on load, which keeps
//! the file free of cycles and independent of map ordering.
//!
//! # File format
//! ```json
//! {
//!   "nodes": {
//!     "root": {"id": "root", "name": "ROOT", "content": "", "parent_id": null,
//!              "created_at": 1717000000.123, "last_accessed": 1717000000.123,
//!              "access_count": 0, "seq": 0}
//!   },
//!   "root_id": "root"
//! }
//! ```
//!
//! # Key Points
//! - Write-through: every mutation rewrites the whole file
//! - Atomic: write to `<file>.tmp`, then rename over the target
//! - A malformed file is fatal; there is no automatic recovery

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::{Result, TreeError};
use super::node::{MemoryNode, ID_SEPARATOR, ROOT_ID};
use super::schema::Schema;
use super::tree::MemoryTree;

/// One node as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Epoch seconds
    #[serde(default)]
    pub created_at: f64,
    /// Epoch seconds
    #[serde(default)]
    pub last_accessed: f64,
    #[serde(default)]
    pub access_count: u64,
    /// Insertion order; absent in files written before it existed
    #[serde(default)]
    pub seq: u64,
}

/// The whole store file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreFile {
    pub nodes: BTreeMap<String, NodeRecord>,
    #[serde(default = "default_root_id")]
    pub root_id: String,
}

fn default_root_id() -> String {
    ROOT_ID.to_string()
}

impl From<&MemoryNode> for NodeRecord {
    fn from(node: &MemoryNode) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            content: node.content.clone(),
            parent_id: node.parent_id.clone(),
            created_at: to_epoch(node.created_at),
            last_accessed: to_epoch(node.last_accessed),
            access_count: node.access_count,
            seq: node.seq,
        }
    }
}

impl NodeRecord {
    /// Rebuild an unlinked node
    fn to_node(&self) -> MemoryNode {
        let mut node = match self.parent_id.as_deref() {
            None => MemoryNode::root(),
            Some(parent_id) => {
                let prefix = format!("{}{}", parent_id, ID_SEPARATOR);
                let key = self.id.strip_prefix(&prefix).unwrap_or(self.name.as_str());
                MemoryNode::child(parent_id, key, self.name.clone(), self.content.clone(), self.seq)
            }
        };
        node.id = self.id.clone();
        node.name = self.name.clone();
        node.content = self.content.clone();
        node.created_at = from_epoch(self.created_at);
        node.last_accessed = from_epoch(self.last_accessed);
        node.access_count = self.access_count;
        node.seq = self.seq;
        node
    }
}

/// Millisecond resolution keeps the f64 round trip exact
fn to_epoch(dt: DateTime<Utc>) -> f64 {
    dt.timestamp_millis() as f64 / 1000.0
}

fn from_epoch(secs: f64) -> DateTime<Utc> {
    if !secs.is_finite() {
        return DateTime::default();
    }
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64).unwrap_or_default()
}

impl StoreFile {
    pub fn from_tree(tree: &MemoryTree) -> Self {
        let nodes = tree
            .nodes()
            .map(|node| (node.id.clone(), NodeRecord::from(node)))
            .collect();
        Self {
            nodes,
            root_id: ROOT_ID.to_string(),
        }
    }
}

impl MemoryTree {
    /// Load the tree from `store_path`, or build it from the schema and save
    /// it if the store file does not exist yet.
    pub fn open(store_path: &Path, schema_path: &Path) -> Result<Self> {
        if store_path.exists() {
            return Self::load(store_path);
        }

        let schema = Schema::load(schema_path)?;
        let tree = Self::from_schema(&schema, Some(store_path.to_path_buf()));
        tree.save()?;

        info!(
            store = %store_path.display(),
            schema = %schema_path.display(),
            nodes = tree.node_count(),
            "Initialized memory tree from schema"
        );
        Ok(tree)
    }

    /// Load an existing store file
    pub fn load(store_path: &Path) -> Result<Self> {
        let text = fs::read_to_string(store_path).map_err(|source| TreeError::Persistence {
            path: store_path.to_path_buf(),
            source,
        })?;
        let file: StoreFile = serde_json::from_str(&text)
            .map_err(|e| TreeError::corrupt_store(store_path, e))?;

        let tree = Self::from_store_file(&file, store_path)?;
        debug!(
            store = %store_path.display(),
            nodes = tree.node_count(),
            "Loaded memory tree"
        );
        Ok(tree)
    }

    fn from_store_file(file: &StoreFile, store_path: &Path) -> Result<Self> {
        let corrupt = |reason: String| TreeError::corrupt_store(store_path, reason);

        if file.root_id != ROOT_ID {
            return Err(corrupt(format!("unexpected root_id {:?}", file.root_id)));
        }

        // Pass 1: nodes without children
        let mut nodes: HashMap<String, MemoryNode> = HashMap::with_capacity(file.nodes.len());
        for (key, record) in &file.nodes {
            if *key != record.id {
                return Err(corrupt(format!("record {:?} is stored under {:?}", record.id, key)));
            }
            nodes.insert(record.id.clone(), record.to_node());
        }

        match nodes.get(ROOT_ID) {
            Some(root) if root.is_root() => {}
            Some(_) => return Err(corrupt("root has a parent".to_string())),
            None => return Err(corrupt("missing root node".to_string())),
        }

        // Pass 2: relink in insertion order, whatever order the map had
        let mut order: Vec<&NodeRecord> =
            file.nodes.values().filter(|r| r.id != ROOT_ID).collect();
        order.sort_by(|a, b| {
            a.seq
                .cmp(&b.seq)
                .then(a.created_at.total_cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });

        for record in order {
            let parent_id = record
                .parent_id
                .as_deref()
                .ok_or_else(|| corrupt(format!("node {:?} has no parent", record.id)))?;
            let parent = nodes
                .get_mut(parent_id)
                .ok_or_else(|| corrupt(format!("node {:?} has missing parent {:?}", record.id, parent_id)))?;
            parent.link_child(record.id.clone());
        }

        let tree = Self::from_nodes(nodes, store_path.to_path_buf());
        if tree.preorder().len() != tree.node_count() {
            return Err(corrupt("nodes unreachable from root".to_string()));
        }
        Ok(tree)
    }

    /// Write the whole tree to its store file. In-memory trees are a no-op.
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.store_path() else {
            return Ok(());
        };

        let file = StoreFile::from_tree(self);
        let persistence = |source: std::io::Error| TreeError::Persistence {
            path: path.to_path_buf(),
            source,
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(|e| persistence(e.into()))?;
        write_atomic(path, &bytes).map_err(persistence)?;

        debug!(store = %path.display(), nodes = file.nodes.len(), "Saved memory tree");
        Ok(())
    }
}

/// Write `bytes` to a sibling temp file, then rename it over `path`
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let written = File::create(&tmp_path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}
