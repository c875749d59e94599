//! Schema - Declarative category skeleton
//!
//! Consulted only when no store file exists yet. The schema is a nested JSON
//! mapping from category name to a further mapping; an empty mapping is a
//! leaf category. It may be wrapped in a top-level `"root"` key.
//!
//! ```json
//! {"root": {"人物": {}, "事件": {"旅行": {}}}}
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use super::error::{Result, TreeError};
use super::node::{MemoryNode, ROOT_ID};
use super::tree::{validate_name, MemoryTree};

/// A validated category skeleton. Key order is preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    categories: Map<String, Value>,
}

impl Schema {
    /// Read and validate a schema file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| TreeError::schema_load(path, e))?;
        Self::parse(&text, path)
    }

    /// Parse schema text; `origin` is only used in error messages
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| TreeError::schema_load(origin, e))?;

        let mut categories = match value {
            Value::Object(map) => map,
            _ => return Err(TreeError::schema_load(origin, "top level must be an object")),
        };

        // Unwrap {"root": {...}}
        if categories.len() == 1 {
            if let Some(Value::Object(inner)) = categories.get(ROOT_ID) {
                categories = inner.clone();
            }
        }

        Self::validate(&categories, origin)?;
        Ok(Self { categories })
    }

    /// Sibling names must stay distinct once trimmed, since they become ids
    fn validate(map: &Map<String, Value>, origin: &Path) -> Result<()> {
        let mut seen = HashSet::with_capacity(map.len());
        for (name, value) in map {
            let trimmed = validate_name(name).map_err(|e| TreeError::schema_load(origin, e))?;
            if !seen.insert(trimmed) {
                return Err(TreeError::schema_load(
                    origin,
                    format!("duplicate sibling category {:?}", name.trim()),
                ));
            }
            match value {
                Value::Object(children) => Self::validate(children, origin)?,
                other => {
                    return Err(TreeError::schema_load(
                        origin,
                        format!("category {:?} must map to an object, found {}", name, other),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Skeleton written by `memtree init`
    pub fn default_skeleton() -> Self {
        let value = json!({
            "个人信息": {
                "基本信息": {},
                "联系方式": {}
            },
            "偏好": {},
            "经历": {
                "工作": {},
                "学习": {},
                "旅行": {}
            },
            "计划": {}
        });
        match value {
            Value::Object(categories) => Self { categories },
            _ => Self {
                categories: Map::new(),
            },
        }
    }

    /// Top-level category names in order
    pub fn top_level(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn to_json_pretty(&self) -> String {
        let mut wrapped = Map::new();
        wrapped.insert(ROOT_ID.to_string(), Value::Object(self.categories.clone()));
        serde_json::to_string_pretty(&Value::Object(wrapped)).unwrap_or_else(|_| "{}".to_string())
    }
}

impl MemoryTree {
    /// Build a fresh tree from a schema. Nothing is written to disk.
    pub fn from_schema(schema: &Schema, store_path: Option<PathBuf>) -> Self {
        let mut tree = Self::with_root(store_path);
        tree.instantiate(ROOT_ID, &schema.categories);
        tree
    }

    fn instantiate(&mut self, parent_id: &str, categories: &Map<String, Value>) {
        for (name, value) in categories {
            let name = name.trim();
            let seq = self.alloc_seq();
            let id = self.insert(MemoryNode::child(parent_id, name, name, "", seq));
            if let Value::Object(children) = value {
                self.instantiate(&id, children);
            }
        }
    }
}
